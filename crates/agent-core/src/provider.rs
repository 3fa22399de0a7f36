//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (OpenAI-compatible,
//! Bedrock-style gateways, local runtimes, ...) allowing the agent to work
//! with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! // Create a provider
//! let provider = OpenAiProvider::new(config);
//!
//! // Use through the trait
//! let completion = provider.complete(&messages, &options).await?;
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4.1", "claude-3-sonnet")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chunk from streaming completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamChunk {
    /// The text delta
    pub delta: String,

    /// Whether this is the final chunk
    pub done: bool,

    /// Token usage (typically only on final chunk)
    pub usage: Option<TokenUsage>,
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Generate a completion from messages
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// Generate a streaming completion
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream>;
}
