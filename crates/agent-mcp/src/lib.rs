//! # agent-mcp
//!
//! MCP (Model Context Protocol) client for the agent: transports (stdio
//! child process or streamable HTTP), the initialize handshake, catalog
//! discovery with operator-side filtering and bound arguments, and the
//! bridge that surfaces remote tools through the agent's tool registry.

pub mod bridge;
pub mod client;
pub mod discovery;
pub mod error;
pub mod jsonrpc;
pub mod transport;

pub use bridge::{RemoteTool, register_catalog};
pub use client::{CallToolResult, Content, McpClient, ServerInfo, ToolDefinition};
pub use discovery::discover_tools;
pub use error::McpError;
pub use transport::{Transport, TransportConfig};
