//! # agent-core
//!
//! Core agent logic with provider-agnostic LLM abstraction, an extensible
//! tool system, and session-aware turn orchestration.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ChatService                             │
//! │  sessions · per-thread locks · turn budget · collapse        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                       Agent                            │  │
//! │  │  ┌───────────┐  ┌───────────┐  ┌───────────────────┐   │  │
//! │  │  │ Reasoning │──│   Tool    │──│   LlmProvider     │   │  │
//! │  │  │   Loop    │  │ Registry  │  │   (Strategy)      │   │  │
//! │  │  └───────────┘  └───────────┘  └───────────────────┘   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping LLM backends without changing
//! agent logic; the `Tool` trait does the same for capabilities, whether
//! local or bridged from a remote tool server.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod service;
pub mod session;
pub mod tool;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{AgentError, Result};
pub use event::{AgentEvent, TracingObserver, TurnObserver};
pub use message::{Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder, AgentConfig, TurnStream};
pub use service::ChatService;
pub use session::{InMemorySessionStore, SessionStore, ThreadId};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSpec};
