//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Could not reach or handshake with the tool server
    #[error("Tool server connection failed: {0}")]
    Connection(String),

    /// Tool discovery produced no usable catalog
    #[error("Tool discovery failed: {0}")]
    ToolDiscovery(String),

    /// Agent assembly failed (bad model config, missing provider, ...)
    #[error("Agent build failed: {0}")]
    Build(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// A turn exceeded its wall-clock budget
    #[error("Turn timed out after {0}s")]
    Timeout(u64),

    /// The agent is not (or never became) ready to serve requests
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Errors that doom startup: once one of these surfaces during
    /// initialization the agent lands in a terminal failed state.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Connection(_) | AgentError::ToolDiscovery(_) | AgentError::Build(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Connection(_) => {
                "Could not reach the tool server. Please try again later.".into()
            }
            AgentError::ToolDiscovery(_) => {
                "The agent could not load its tools. Please contact the administrator.".into()
            }
            AgentError::Build(_) => {
                "The agent is misconfigured. Please contact the administrator.".into()
            }
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ToolNotFound(name) => format!("The tool '{}' is not available.", name),
            AgentError::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            AgentError::Timeout(secs) => {
                format!("The request did not complete within {}s. Please try again.", secs)
            }
            AgentError::Unavailable(_) => {
                "Agent not initialized. Please restart the server.".into()
            }
            AgentError::Json(_) => "An unexpected error occurred.".into(),
        }
    }
}
