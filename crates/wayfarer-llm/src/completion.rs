//! Streaming completion types
//!
//! A model invocation yields a channel of [`StreamEvent`]s: zero or more
//! `Delta` chunks followed by exactly one `Completed` event. Anything else
//! (an `Err` item, or the channel closing early) is an upstream failure.

use crate::error::Result;
use crate::message::Message;
use crate::tools::SharedToolTransport;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Channel capacity used by providers for their event streams
pub const STREAM_BUFFER: usize = 32;

/// Receiving side of a model invocation
pub type ChatStream = mpsc::Receiver<Result<StreamEvent>>;

/// A chat request sent to a [`ChatModel`](crate::ChatModel)
#[derive(Clone, Default)]
pub struct ChatRequest {
    /// Conversation the request belongs to
    pub conversation_id: String,
    /// Authorization subject used for downstream tool calls
    pub subject_id: String,
    /// Optional system prompt (kept out of `messages`)
    pub system_prompt: Option<String>,
    /// Conversation history followed by the new user message
    pub messages: Vec<Message>,
    /// Tool connections available for this invocation
    pub tools: Vec<SharedToolTransport>,
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("conversation_id", &self.conversation_id)
            .field("subject_id", &self.subject_id)
            .field("system_prompt", &self.system_prompt.is_some())
            .field("messages", &self.messages.len())
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl ChatRequest {
    /// Create a new chat request
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            subject_id: subject_id.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Add messages
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Attach tool connections
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<SharedToolTransport>) -> Self {
        self.tools = tools;
        self
    }
}

/// An operation the model proposes that needs explicit user approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    /// Kind of operation (e.g. "booking", "payment")
    pub operation: String,
    /// Human-readable summary shown to the user
    pub summary: String,
    /// Operation details, passed back verbatim on approval
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Final payload of a model invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Authoritative final text; when absent the streamed deltas are used
    #[serde(default)]
    pub text: Option<String>,
    /// Structured result items (flight offers, hotel listings, ...)
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    /// Suggested follow-up prompts
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Pending operation requiring approval
    #[serde(default)]
    pub confirmation: Option<PendingConfirmation>,
}

impl Completion {
    /// Completion carrying only final text
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// One event on a model stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Partial output, in order
    Delta(String),
    /// Upstream signalled completion
    Completed(Completion),
}
