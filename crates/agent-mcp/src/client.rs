//! MCP Client
//!
//! Connection lifecycle against one tool server: initialize handshake,
//! catalog listing with pagination, tool invocation, graceful close.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::McpError;
use crate::transport::{HttpTransport, StdioTransport, Transport, TransportConfig};

const PROTOCOL_VERSION: &str = "2025-06-18";
const CLIENT_NAME: &str = "datachat";

/// Server identity from the initialize handshake
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    protocol_version: String,
    #[serde(default)]
    server_info: ServerInfo,
    #[serde(default)]
    instructions: Option<String>,
}

/// One tool as advertised by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
}

fn default_schema() -> Value {
    json!({"type": "object"})
}

/// Result of a tools/call invocation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub structured_content: Option<Value>,
}

/// Content parts of a tool result. Only text is consumed downstream; other
/// kinds pass through as unknown.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

/// Client for one tool server connection
pub struct McpClient {
    transport: Box<dyn Transport>,
    server_info: ServerInfo,
    instructions: Option<String>,
    closed: AtomicBool,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server_info", &self.server_info)
            .field("instructions", &self.instructions)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Open the transport and run the initialize handshake.
    ///
    /// On handshake failure the transport is torn down before the error is
    /// returned, so no child process or session is left behind.
    pub async fn connect(config: &TransportConfig) -> Result<Self, McpError> {
        let transport: Box<dyn Transport> = match config {
            TransportConfig::Stdio { command, args, env } => {
                Box::new(StdioTransport::spawn(command, args, env).await?)
            }
            TransportConfig::Http { url, headers } => {
                Box::new(HttpTransport::new(url.clone(), headers)?)
            }
        };
        Self::handshake(transport).await
    }

    /// Run the handshake over an already-open transport.
    pub async fn handshake(transport: Box<dyn Transport>) -> Result<Self, McpError> {
        match run_handshake(transport.as_ref()).await {
            Ok(init) => {
                tracing::info!(
                    server = %init.server_info.name,
                    version = %init.server_info.version,
                    "connected to tool server"
                );
                Ok(Self {
                    transport,
                    server_info: init.server_info,
                    instructions: init.instructions,
                    closed: AtomicBool::new(false),
                })
            }
            Err(e) => {
                let _ = transport.close().await;
                Err(e)
            }
        }
    }

    /// Fetch the full catalog, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.ensure_open()?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({"cursor": c}));
            let result = self.transport.request("tools/list", params).await?;

            let page: Vec<ToolDefinition> = serde_json::from_value(
                result
                    .get("tools")
                    .cloned()
                    .unwrap_or(Value::Array(Vec::new())),
            )
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/list: {e}")))?;
            tools.extend(page);

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) => cursor = Some(next.to_owned()),
                None => break,
            }
        }

        Ok(tools)
    }

    /// Invoke one tool by name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        self.ensure_open()?;
        let params = json!({"name": name, "arguments": arguments});
        let result = self.transport.request("tools/call", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    /// Tear the connection down. Safe to call more than once; operations
    /// after the first close fail with [`McpError::Closed`].
    pub async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(server = %self.server_info.name, "closing tool server connection");
        self.transport.close().await
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Optional server-supplied instructions, suitable for prompt context
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    fn ensure_open(&self) -> Result<(), McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        Ok(())
    }
}

async fn run_handshake(transport: &dyn Transport) -> Result<InitializeResult, McpError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
    });
    let raw = transport.request("initialize", Some(params)).await?;
    let init: InitializeResult = serde_json::from_value(raw)
        .map_err(|e| McpError::Protocol(format!("failed to parse initialize result: {e}")))?;

    if init.protocol_version != PROTOCOL_VERSION {
        tracing::warn!(
            negotiated = %init.protocol_version,
            expected = %PROTOCOL_VERSION,
            "MCP protocol version mismatch"
        );
    }

    transport.notify("notifications/initialized", None).await?;
    Ok(init)
}
