//! Registry Bridge
//!
//! Exposes remote MCP tools through the agent's `Tool` trait. One shared
//! client backs every bridged tool, so all calls ride the same connection.

use std::sync::Arc;

use agent_core::error::Result as CoreResult;
use agent_core::tool::{Tool, ToolRegistry, ToolResult, ToolSpec};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::{CallToolResult, Content, McpClient};

/// A remote tool surfaced through the registry
pub struct RemoteTool {
    spec: ToolSpec,
    client: Arc<McpClient>,
}

impl RemoteTool {
    pub fn new(spec: ToolSpec, client: Arc<McpClient>) -> Self {
        Self { spec, client }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> CoreResult<ToolResult> {
        match self
            .client
            .call_tool(&self.spec.name, Value::Object(arguments.clone()))
            .await
        {
            Ok(result) => Ok(flatten_result(&self.spec.name, result)),
            Err(e) => {
                tracing::warn!(tool = %self.spec.name, error = %e, "tool call failed");
                Ok(ToolResult::failure(&self.spec.name, e.to_string()))
            }
        }
    }
}

/// Register every discovered spec as a remote tool on one shared client
pub fn register_catalog(
    registry: &mut ToolRegistry,
    specs: Vec<ToolSpec>,
    client: &Arc<McpClient>,
) -> CoreResult<()> {
    for spec in specs {
        registry.register(RemoteTool::new(spec, client.clone()))?;
    }
    Ok(())
}

/// Collapse an MCP call result into the agent's tool result shape.
///
/// Structured content wins when present; otherwise the text parts joined
/// with newlines. A server-side `isError` becomes a failure result so the
/// model sees what went wrong.
fn flatten_result(name: &str, result: CallToolResult) -> ToolResult {
    let text = result
        .content
        .iter()
        .filter_map(|part| match part {
            Content::Text { text } => Some(text.as_str()),
            Content::Unknown => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error {
        let reason = if text.is_empty() {
            "tool reported an error".to_string()
        } else {
            text
        };
        return ToolResult::failure(name, reason);
    }

    let output = result.structured_content.unwrap_or(Value::String(text));
    ToolResult::success(name, output)
}
