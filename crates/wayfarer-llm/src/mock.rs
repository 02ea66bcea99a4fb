//! Mock chat model for testing
//!
//! Replays scripted replies in order and records every request it receives,
//! so tests can assert both on what reached the model and on how often it
//! was called.

use crate::completion::{ChatRequest, ChatStream, Completion, StreamEvent, STREAM_BUFFER};
use crate::error::{Error, Result};
use crate::provider::ChatModel;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted model behaviour
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Emit the deltas, then the completion. `None` closes the stream early.
    Stream {
        /// Partial chunks, in order
        deltas: Vec<String>,
        /// Final event
        completion: Option<Completion>,
    },
    /// Emit the deltas, then an error item
    StreamError {
        /// Partial chunks sent before the failure
        deltas: Vec<String>,
        /// Error message
        error: String,
    },
    /// Refuse the call outright
    Reject(String),
}

impl ScriptedReply {
    /// Stream the given chunks and complete with no extra metadata
    #[must_use]
    pub fn chunks(deltas: &[&str]) -> Self {
        Self::Stream {
            deltas: deltas.iter().map(|d| (*d).to_string()).collect(),
            completion: Some(Completion::default()),
        }
    }
}

/// A mock chat model that plays back queued replies
pub struct MockChatModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
    chunk_delay: Option<Duration>,
}

impl Default for MockChatModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatModel {
    /// Create a new mock model
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            chunk_delay: None,
        }
    }

    /// Sleep between emitted events
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Queue a reply
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Number of `stream` invocations so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self) -> ScriptedReply {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::chunks(&["mock ", "response"]))
    }
}

#[async_trait::async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let (deltas, tail) = match self.next_reply() {
            ScriptedReply::Reject(message) => return Err(Error::Api(message)),
            ScriptedReply::Stream { deltas, completion } => {
                (deltas, completion.map(|c| Ok(StreamEvent::Completed(c))))
            }
            ScriptedReply::StreamError { deltas, error } => (deltas, Some(Err(Error::Api(error)))),
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let delay = self.chunk_delay;
        tokio::spawn(async move {
            let events = deltas
                .into_iter()
                .map(|d| Ok(StreamEvent::Delta(d)))
                .chain(tail);
            for event in events {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_requests() {
        let model = MockChatModel::new();
        model.push_reply(ScriptedReply::chunks(&["a", "b"]));

        let mut rx = model
            .stream(ChatRequest::new("conv-1", "subject-1"))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamEvent::Delta("a".into()));
        assert_eq!(rx.recv().await.unwrap().unwrap(), StreamEvent::Delta("b".into()));
        assert!(matches!(
            rx.recv().await.unwrap().unwrap(),
            StreamEvent::Completed(_)
        ));
        assert!(rx.recv().await.is_none());

        assert_eq!(model.call_count(), 1);
        assert_eq!(model.requests()[0].conversation_id, "conv-1");
    }

    #[tokio::test]
    async fn test_mock_reject() {
        let model = MockChatModel::new();
        model.push_reply(ScriptedReply::Reject("down".into()));
        let result = model.stream(ChatRequest::default()).await;
        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_truncated_stream() {
        let model = MockChatModel::new();
        model.push_reply(ScriptedReply::Stream {
            deltas: vec!["partial".into()],
            completion: None,
        });
        let mut rx = model.stream(ChatRequest::default()).await.unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(rx.recv().await.is_none());
    }
}
