//! Turn Events
//!
//! The reasoning loop is exposed as a stream of typed events rather than a
//! single opaque string. Downstream consumers collapse the stream into a
//! final answer; observers can tap it for progress reporting.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::session::ThreadId;

/// One event from an in-flight agent turn
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A fragment of assistant text, in emission order
    MessageDelta { text: String },

    /// The agent decided to invoke a tool
    ToolCallIssued { name: String, arguments: Map<String, Value> },

    /// A tool invocation finished (success or failure)
    ToolCallResult { payload: Value },
}

/// Observer hook for turn progress
///
/// Called synchronously for every event the turn emits, in order.
/// Implementations must be cheap; heavy work belongs on a channel.
pub trait TurnObserver: Send + Sync {
    fn on_event(&self, thread: &ThreadId, event: &AgentEvent);
}

/// Observer that forwards events to the `tracing` subscriber
pub struct TracingObserver;

impl TurnObserver for TracingObserver {
    fn on_event(&self, thread: &ThreadId, event: &AgentEvent) {
        match event {
            AgentEvent::MessageDelta { text } => {
                tracing::trace!(thread = %thread, len = text.len(), "message delta");
            }
            AgentEvent::ToolCallIssued { name, .. } => {
                tracing::debug!(thread = %thread, tool = %name, "tool call issued");
            }
            AgentEvent::ToolCallResult { payload } => {
                let success = payload
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                tracing::debug!(thread = %thread, success, "tool call finished");
            }
        }
    }
}
