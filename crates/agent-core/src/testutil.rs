//! Shared test doubles for the crate's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, CompletionStream, GenerationOptions, LlmProvider, StreamChunk};
use crate::tool::{Tool, ToolResult, ToolSpec};

/// Provider that replays canned responses in order.
///
/// Exhausting the script is a provider error, which doubles as a way to
/// simulate backend failures. An optional delay before each response makes
/// timeout and concurrency behavior testable under paused time.
pub(crate) struct Scripted {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl Scripted {
    pub(crate) fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of completions that were in flight at once
    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }
}

#[async_trait]
impl LlmProvider for Scripted {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        _messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.next_reply();
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Completion {
            content: reply?,
            model: options.model.clone(),
            usage: None,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let completion = self.complete(messages, options).await?;
        let chunks = split_into_chunks(&completion.content);
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// Two text deltas plus a terminal done chunk, mirroring real providers.
fn split_into_chunks(content: &str) -> Vec<StreamChunk> {
    let mid = content
        .char_indices()
        .nth(content.chars().count() / 2)
        .map_or(content.len(), |(i, _)| i);
    let mut chunks: Vec<StreamChunk> = [&content[..mid], &content[mid..]]
        .iter()
        .filter(|piece| !piece.is_empty())
        .map(|piece| StreamChunk {
            delta: (*piece).to_string(),
            done: false,
            usage: None,
        })
        .collect();
    chunks.push(StreamChunk {
        delta: String::new(),
        done: true,
        usage: None,
    });
    chunks
}

/// Tool that returns its merged argument map as the result payload.
pub(crate) struct EchoTool {
    name: String,
}

impl EchoTool {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            &self.name,
            "Echo the arguments back",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}}
            }),
        )
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<ToolResult> {
        Ok(ToolResult::success(
            &self.name,
            Value::Object(arguments.clone()),
        ))
    }
}
