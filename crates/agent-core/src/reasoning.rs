//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The agent observes, thinks, acts (via tools), and responds.
//!
//! A turn is exposed as a stream of [`AgentEvent`]s: assistant text arrives
//! as deltas, tool activity as issued/result pairs. Consumers that only want
//! the final answer collapse the stream (see `service`).

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::error::{AgentError, Result};
use crate::event::AgentEvent;
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

pub(crate) const TOOL_FENCE_OPEN: &str = "```tool";
pub(crate) const TOOL_FENCE_CLOSE: &str = "```";

/// Stream of events from one agent turn
pub type TurnStream<'a> = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send + 'a>>;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Build the full system prompt including tool descriptions
    fn compose_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.prompt_section());
        }

        prompt
    }

    /// Run one turn over the given history, yielding events as they happen.
    ///
    /// The history must already end with the user message for this turn.
    /// The stream terminates after the final assistant segment, or with an
    /// error if the provider fails or the iteration budget is exhausted.
    /// Dropping the stream cancels whatever call is in flight.
    pub fn stream_turn(&self, history: Vec<Message>) -> TurnStream<'_> {
        Box::pin(try_stream! {
            let mut transcript = Vec::with_capacity(history.len() + 4);
            transcript.push(Message::system(self.compose_system_prompt()));
            transcript.extend(history);

            let mut answered = false;
            for _ in 0..self.config.max_iterations {
                let mut chunks = self
                    .provider
                    .complete_stream(&transcript, &self.config.generation)
                    .await?;

                let mut content = String::new();
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk?;
                    if !chunk.delta.is_empty() {
                        content.push_str(&chunk.delta);
                        yield AgentEvent::MessageDelta { text: chunk.delta };
                    }
                    if chunk.done {
                        break;
                    }
                }
                drop(chunks);

                transcript.push(Message::assistant(&content));

                let Some(call) = parse_tool_call(&content) else {
                    answered = true;
                    break;
                };

                tracing::debug!(tool = %call.name, "executing tool");
                yield AgentEvent::ToolCallIssued {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };

                let result = self.execute_tool(&call).await;
                yield AgentEvent::ToolCallResult {
                    payload: serde_json::to_value(&result)?,
                };

                transcript.push(Message::tool(render_tool_result(&result)));
            }

            if !answered {
                Err(AgentError::MaxIterations(self.config.max_iterations))?;
            }
        })
    }

    /// Execute a tool call, folding infrastructure errors into failure results
    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(&call.name, format!("Error: {}", e)),
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Parse a tool call from LLM response
fn parse_tool_call(content: &str) -> Option<ToolCall> {
    // Look for ```tool ... ``` blocks
    if let Some(start_idx) = content.find(TOOL_FENCE_OPEN) {
        let after_marker = &content[start_idx + TOOL_FENCE_OPEN.len()..];
        if let Some(end_idx) = after_marker.find(TOOL_FENCE_CLOSE) {
            let json_str = after_marker[..end_idx].trim();
            if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
                return Some(call);
            }
        }
    }

    // Fallback: raw JSON object with a "tool" key
    if !content.contains(r#""tool""#) {
        return None;
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}

/// Format tool result for the transcript
fn render_tool_result(result: &ToolResult) -> String {
    let body = match &result.output {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, body)
    } else {
        format!("[Tool '{}' failed]\n{}", result.name, body)
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    registry: ToolRegistry,
    pending: Vec<Arc<dyn Tool>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            registry: ToolRegistry::new(),
            pending: Vec::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.pending.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.generation.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Assemble the agent. Fails on a missing provider or a tool name clash.
    pub fn build(mut self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Build("provider is required".into()))?;

        for tool in self.pending {
            self.registry
                .register_arc(tool)
                .map_err(|e| AgentError::Build(e.to_string()))?;
        }

        Ok(Agent::new(provider, Arc::new(self.registry), self.config))
    }
}
