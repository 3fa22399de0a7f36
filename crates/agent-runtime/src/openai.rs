//! OpenAI-Compatible LLM Provider
//!
//! Implementation of `LlmProvider` against the `/v1/chat/completions`
//! protocol. Works with OpenAI itself and with any compatible gateway
//! (Azure OpenAI, vLLM, LiteLLM, ...) by pointing `base_url` at it.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, CompletionStream, GenerationOptions, LlmProvider, StreamChunk, TokenUsage,
    },
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base URL (without the `/v1/...` path)
    pub base_url: String,

    /// Bearer token for the API
    pub api_key: String,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: String::new(),
            connect_timeout_secs: 10,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com".into());
        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                AgentError::Build("LLM_API_KEY (or OPENAI_API_KEY) is not set".into())
            })?;

        Ok(Self {
            base_url,
            api_key,
            ..Default::default()
        })
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAiProvider {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create a new provider with custom endpoint and key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(OpenAiConfig {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::Build("OpenAI API key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| AgentError::Build(format!("HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert agent messages to the chat completion wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    // The wire "tool" role requires call ids this loop does
                    // not track, so tool output rides as user context.
                    Role::Tool => "user",
                },
                content: m.content.clone(),
            })
            .collect()
    }

    async fn post_chat(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = self.endpoint("/v1/chat/completions");
        self.http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::Provider(format!("request to {url} failed: {e}")))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn health_check(&self) -> Result<bool> {
        let url = self.endpoint("/v1/models");
        match self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        let response = self.post_chat(&request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Provider(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(AgentError::Provider(format!(
                "OpenAI API error {status}: {body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::Provider(format!("unexpected completion payload: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            content,
            model: options.model.clone(),
            usage: parsed.usage,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
        };

        let response = self.post_chat(&request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| AgentError::Provider(format!("failed to read response body: {e}")))?;
            return Err(AgentError::Provider(format!(
                "OpenAI API error {status}: {body}"
            )));
        }

        // SSE line-based parser over the byte stream. Unparseable data lines
        // and comment/blank lines are skipped.
        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut line_buf = String::new();
            let mut usage: Option<TokenUsage> = None;

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| AgentError::Provider(format!("stream read failed: {e}")))?;
                line_buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = line_buf.find('\n') {
                    let line: String = line_buf.drain(..=pos).collect();
                    let Some(data) = line.trim_end().strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'read;
                    }
                    let Ok(parsed) = serde_json::from_str::<StreamResponse>(data) else {
                        continue;
                    };
                    if let Some(u) = parsed.usage {
                        usage = Some(u);
                    }
                    for choice in parsed.choices {
                        if let Some(delta) = choice.delta.content {
                            if !delta.is_empty() {
                                yield StreamChunk { delta, done: false, usage: None };
                            }
                        }
                    }
                }
            }

            yield StreamChunk { delta: String::new(), done: true, usage };
        };

        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Private serde types for the chat completion wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
