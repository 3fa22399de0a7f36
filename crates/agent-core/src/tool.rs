//! Tool System
//!
//! Extensible tool framework for agent capabilities. Tools are registered at
//! startup (typically from a remote tool server's catalog) and invoked by the
//! reasoning loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Declarative description of a tool, as advertised to the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    #[serde(default)]
    pub description: String,

    /// JSON Schema for the tool's arguments
    pub input_schema: Value,

    /// Arguments injected on every call, invisible to the LLM.
    /// A bound value overrides anything the model supplies for the same key.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub bound_args: Map<String, Value>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            bound_args: Map::new(),
        }
    }

    pub fn with_bound_args(mut self, bound_args: Map<String, Value>) -> Self {
        self.bound_args = bound_args;
        self
    }

    /// Keys the model must still supply: `required` in the schema minus
    /// anything covered by a bound argument.
    pub fn required_keys(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .filter(|key| !self.bound_args.contains_key(*key))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Tool call request from the LLM
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(rename = "tool", alias = "name")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Output payload (result data or error message)
    pub output: Value,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: Value) -> Self {
        Self {
            name: name.into(),
            success: true,
            output,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            output: Value::String(error.into()),
        }
    }
}

/// Tool trait - implement to add new capabilities
///
/// Execution receives the merged argument map (model-supplied plus bound).
/// Domain failures should come back as a failure [`ToolResult`] so the agent
/// can surface them to the model; `Err` is reserved for infrastructure
/// problems.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's spec for catalog and prompt generation
    fn spec(&self) -> ToolSpec;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<ToolResult>;
}

/// Registry for available tools
///
/// Preserves registration order so prompt generation is deterministic.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a new tool. Tool names must be unique.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool. Tool names must be unique.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.spec().name;
        if self.index.contains_key(&name) {
            return Err(AgentError::ToolDiscovery(format!(
                "duplicate tool name '{}'",
                name
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    /// Execute a tool call
    ///
    /// Merges bound arguments over the model-supplied ones, checks required
    /// keys, and dispatches. Missing arguments come back as a failure result
    /// rather than an error so the model gets a chance to correct itself.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        let spec = tool.spec();

        let mut arguments = call.arguments.clone();
        for (key, value) in &spec.bound_args {
            arguments.insert(key.clone(), value.clone());
        }

        let missing: Vec<&str> = spec
            .required_keys()
            .into_iter()
            .filter(|key| !arguments.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Ok(ToolResult::failure(
                &call.name,
                format!("missing required arguments: {}", missing.join(", ")),
            ));
        }

        tool.execute(&arguments).await
    }

    /// Get all tool specs, in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Get tool names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.spec().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for spec in self.specs() {
            prompt.push_str(&format!("### {}\n", spec.name));
            if !spec.description.is_empty() {
                prompt.push_str(&format!("{}\n", spec.description));
            }
            prompt.push_str(&format!(
                "Arguments (JSON Schema): {}\n",
                compact_schema(&spec.input_schema, &spec.bound_args)
            ));
            if !spec.bound_args.is_empty() {
                let keys: Vec<&str> = spec.bound_args.keys().map(String::as_str).collect();
                prompt.push_str(&format!(
                    "Supplied automatically (do not pass): {}\n",
                    keys.join(", ")
                ));
            }
            prompt.push('\n');
        }

        prompt
    }
}

/// Render a schema for the prompt with bound keys removed, so the model
/// never sees parameters it must not supply.
fn compact_schema(schema: &Value, bound_args: &Map<String, Value>) -> String {
    if bound_args.is_empty() {
        return schema.to_string();
    }
    let mut schema = schema.clone();
    if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
        for key in bound_args.keys() {
            properties.remove(key);
        }
    }
    if let Some(required) = schema.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|key| key.as_str().is_none_or(|k| !bound_args.contains_key(k)));
    }
    schema.to_string()
}
