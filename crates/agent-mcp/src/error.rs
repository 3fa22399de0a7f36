//! Error Types

use thiserror::Error;

/// MCP client error types
#[derive(Error, Debug)]
pub enum McpError {
    /// Transport-level failure (process spawn, socket, HTTP status)
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a JSON-RPC error object
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The server broke protocol expectations (bad handshake, bad payload)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The advertised catalog is unusable
    #[error("discovery error: {0}")]
    Discovery(String),

    /// Operation attempted after the connection was closed
    #[error("connection closed")]
    Closed,
}
