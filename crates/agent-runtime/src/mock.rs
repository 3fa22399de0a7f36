//! Scripted LLM Provider
//!
//! A deterministic in-process provider that replays canned replies in
//! order. Useful in integration tests and demos where a real model
//! backend is unavailable or undesirable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::Message,
    provider::{Completion, CompletionStream, GenerationOptions, LlmProvider, StreamChunk},
};
use async_trait::async_trait;

/// Replays a fixed script of assistant replies, one per completion call.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Simulate model latency before each reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Provider("scripted replies exhausted".into()))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        _messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Completion {
            content: self.next_reply()?,
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
        Ok(Box::pin(futures::stream::iter(split_into_chunks(
            completion.content,
        ))))
    }
}

/// Chop a reply into two deltas plus a terminal chunk so stream consumers
/// see realistic incremental delivery.
fn split_into_chunks(content: String) -> Vec<Result<StreamChunk>> {
    let done = StreamChunk {
        delta: String::new(),
        done: true,
        usage: None,
    };
    if content.is_empty() {
        return vec![Ok(done)];
    }

    let mid = content
        .char_indices()
        .nth(content.chars().count() / 2)
        .map_or(content.len(), |(i, _)| i);
    let (head, tail) = content.split_at(mid);

    [head, tail]
        .into_iter()
        .filter(|part| !part.is_empty())
        .map(|part| {
            Ok(StreamChunk {
                delta: part.to_string(),
                done: false,
                usage: None,
            })
        })
        .chain(std::iter::once(Ok(done)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_replies_in_order_then_exhausted() {
        let provider = ScriptedProvider::new(["first", "second"]);
        let options = GenerationOptions::default();

        let a = provider.complete(&[], &options).await.unwrap();
        let b = provider.complete(&[], &options).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(provider.calls(), 2);

        let err = provider.complete(&[], &options).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_stream_reassembles_reply() {
        let provider = ScriptedProvider::new(["hello world"]);
        let options = GenerationOptions::default();

        let mut stream = provider.complete_stream(&[], &options).await.unwrap();
        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.delta);
            if chunk.done {
                saw_done = true;
            }
        }
        assert_eq!(text, "hello world");
        assert!(saw_done);
    }
}
