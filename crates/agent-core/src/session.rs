//! Session State
//!
//! Per-thread conversation history. Each caller thread accumulates an
//! append-only message list that seeds the context of its next turn.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::message::Message;

/// Unique conversation thread identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session store trait for conversation persistence
///
/// Unknown threads are created on first append; `history` on an unknown
/// thread is an empty snapshot, never an error.
pub trait SessionStore: Send + Sync {
    /// Append a message to a thread's history
    fn append(&self, thread: &ThreadId, message: Message) -> Result<()>;

    /// Snapshot a thread's history, oldest first
    fn history(&self, thread: &ThreadId) -> Result<Vec<Message>>;

    /// Drop a thread's history entirely
    fn reset(&self, thread: &ThreadId) -> Result<()>;
}

/// In-memory session store (for development/testing)
pub struct InMemorySessionStore {
    threads: std::sync::RwLock<std::collections::HashMap<ThreadId, Vec<Message>>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            threads: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(&self, thread: &ThreadId, message: Message) -> Result<()> {
        let mut threads = self.threads.write().unwrap();
        threads.entry(thread.clone()).or_default().push(message);
        Ok(())
    }

    fn history(&self, thread: &ThreadId) -> Result<Vec<Message>> {
        let threads = self.threads.read().unwrap();
        Ok(threads.get(thread).cloned().unwrap_or_default())
    }

    fn reset(&self, thread: &ThreadId) -> Result<()> {
        let mut threads = self.threads.write().unwrap();
        threads.remove(thread);
        Ok(())
    }
}
