//! # agent-runtime
//!
//! Runtime LLM providers for the agent system.
//!
//! ## Providers
//!
//! - **OpenAI-compatible**: any endpoint speaking the `/v1/chat/completions`
//!   protocol (OpenAI, Azure OpenAI, vLLM, LiteLLM gateways, ...)
//! - **Scripted**: deterministic canned replies for tests and demos
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

pub mod mock;
pub mod openai;

pub use mock::ScriptedProvider;
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, Result, Role, Tool, ToolRegistry,
};
