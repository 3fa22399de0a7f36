//! # agent-server
//!
//! HTTP server fronting the MCP-grounded analyst agent: environment-driven
//! configuration, a one-shot initialization gate, the `/chat` turn
//! endpoint, and static file serving for the bundled UI.

pub mod config;
pub mod handlers;
pub mod prompt;
pub mod state;
