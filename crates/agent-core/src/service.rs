//! Chat Service
//!
//! Session-aware orchestration over the agent. One `chat` call is one turn:
//! append the user message, replay the thread's history through the
//! reasoning loop, collapse the event stream into the final answer, and
//! append that answer back to the thread.
//!
//! Turns on the same thread are serialized; turns on different threads run
//! concurrently. A turn that outlives its wall-clock budget is dropped
//! mid-flight and leaves only the user message behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use crate::error::{AgentError, Result};
use crate::event::{AgentEvent, TurnObserver};
use crate::message::Message;
use crate::reasoning::{Agent, TOOL_FENCE_CLOSE, TOOL_FENCE_OPEN, TurnStream};
use crate::session::{SessionStore, ThreadId};

/// Agent plus the session state and policy around it
pub struct ChatService {
    agent: Agent,
    store: Arc<dyn SessionStore>,
    turn_timeout: Duration,
    observer: Option<Arc<dyn TurnObserver>>,
    locks: ThreadLocks,
}

impl ChatService {
    pub fn new(agent: Agent, store: Arc<dyn SessionStore>, turn_timeout: Duration) -> Self {
        Self {
            agent,
            store,
            turn_timeout,
            observer: None,
            locks: ThreadLocks::default(),
        }
    }

    /// Attach an observer that sees every turn event
    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Run one conversational turn on a thread.
    ///
    /// On success the thread history grows by exactly two messages (the user
    /// message and the final assistant answer). On failure or timeout only
    /// the user message remains recorded.
    pub async fn chat(&self, thread: &ThreadId, user_message: &str) -> Result<String> {
        let _turn = self.locks.acquire(thread).await;

        self.store.append(thread, Message::user(user_message))?;
        let history = self.store.history(thread)?;

        let budget_secs = self.turn_timeout.as_secs();
        let events = self.agent.stream_turn(history);
        let collapsed = timeout(
            self.turn_timeout,
            collapse(thread, self.observer.as_ref(), events),
        )
        .await;

        let answer = match collapsed {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    thread = %thread,
                    timeout_secs = budget_secs,
                    "turn timed out, dropping in-flight work"
                );
                return Err(AgentError::Timeout(budget_secs));
            }
        };

        self.store.append(thread, Message::assistant(&answer))?;
        Ok(answer)
    }
}

/// Collapse a turn's event stream into the final answer text.
///
/// Assistant deltas accumulate into segments bounded by tool activity. The
/// last non-empty segment wins; text around a tool-call block survives, the
/// block itself and tool payloads never do. A turn that produced no
/// assistant text collapses to the empty string.
async fn collapse(
    thread: &ThreadId,
    observer: Option<&Arc<dyn TurnObserver>>,
    mut events: TurnStream<'_>,
) -> Result<String> {
    let mut answer = String::new();
    let mut segment = String::new();

    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(observer) = observer {
            observer.on_event(thread, &event);
        }
        match &event {
            AgentEvent::MessageDelta { text } => segment.push_str(text),
            AgentEvent::ToolCallIssued { .. } | AgentEvent::ToolCallResult { .. } => {
                let candidate = without_tool_block(&segment);
                if !candidate.is_empty() {
                    answer = candidate;
                }
                segment.clear();
            }
        }
    }

    let tail = segment.trim();
    if !tail.is_empty() {
        answer = tail.to_string();
    }
    Ok(answer)
}

/// Strip the first fenced tool block out of a segment, keeping surrounding
/// prose. Returns trimmed text.
fn without_tool_block(segment: &str) -> String {
    let Some(start) = segment.find(TOOL_FENCE_OPEN) else {
        return segment.trim().to_string();
    };
    let after = &segment[start + TOOL_FENCE_OPEN.len()..];
    let mut out = String::from(&segment[..start]);
    if let Some(end) = after.find(TOOL_FENCE_CLOSE) {
        out.push_str(&after[end + TOOL_FENCE_CLOSE.len()..]);
    }
    out.trim().to_string()
}

/// One async mutex per thread id, created on demand
#[derive(Default)]
struct ThreadLocks {
    inner: Mutex<HashMap<ThreadId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    async fn acquire(&self, thread: &ThreadId) -> tokio::sync::OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap();
            map.entry(thread.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }
}
