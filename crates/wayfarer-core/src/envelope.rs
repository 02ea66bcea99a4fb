//! Wire envelopes
//!
//! Inbound prompt frames and outbound response envelopes. Outbound field
//! names are camelCase and optional fields are omitted when empty, so a
//! keep-alive envelope stays a few dozen bytes.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wayfarer_llm::PendingConfirmation;

use crate::error::{Error, Result};

// ============================================================================
// Inbound
// ============================================================================

/// Frame discriminator; only prompts are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    /// A user prompt
    Prompt,
}

/// Prompt frame sent by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFrame {
    /// Frame type
    #[serde(rename = "type")]
    pub kind: FrameType,
    /// Client-chosen request id
    #[serde(default)]
    pub request_id: Option<String>,
    /// Conversation to continue
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// User message text
    pub message: String,
    /// Client submission time (epoch millis)
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl PromptFrame {
    /// Parse a raw text frame
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Accept the frame, assigning ids the client left out
    #[must_use]
    pub fn into_request(self) -> PromptRequest {
        let submitted_at = self
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            .unwrap_or_else(Utc::now);

        PromptRequest {
            request_id: non_blank(self.request_id).unwrap_or_else(|| Uuid::new_v4().to_string()),
            conversation_id: non_blank(self.conversation_id)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            message: self.message,
            submitted_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// An accepted request; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Request id (client-supplied or generated)
    pub request_id: String,
    /// Conversation id (client-supplied or generated)
    pub conversation_id: String,
    /// Raw message text
    pub message: String,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Outbound
// ============================================================================

/// Envelope discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeKind {
    /// Request accepted / still being processed / keep-alive
    Processing,
    /// Partial model output (non-authoritative)
    StreamUpdate,
    /// Final answer
    Response,
    /// Terminal failure
    Error,
}

impl EnvelopeKind {
    /// Whether this kind ends processing for its request
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Response | Self::Error)
    }
}

/// Status values carried by PROCESSING envelopes
pub mod status {
    /// Request accepted and dispatched
    pub const PROCESSING: &str = "processing";
    /// Periodic notice while the model is still working
    pub const THINKING: &str = "thinking";
    /// Session keep-alive
    pub const HEARTBEAT: &str = "heartbeat";
    /// Final answer delivered
    pub const COMPLETED: &str = "completed";
    /// Final answer awaits user approval
    pub const AWAITING_CONFIRMATION: &str = "awaiting_confirmation";
}

/// One outbound message unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Envelope kind
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    /// Request this envelope belongs to (absent for keep-alives)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Conversation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Principal the session belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Echo of the user's message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    /// Partial or final assistant text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
    /// Structured result items
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<serde_json::Value>,
    /// Suggested follow-up prompts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_request_suggestions: Vec<String>,
    /// Whether a pending operation needs approval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_confirmation: Option<bool>,
    /// Pending operation details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_context: Option<PendingConfirmation>,
    /// Status string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// User-safe error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Emission time (epoch millis)
    pub timestamp: i64,
    /// Time since the request was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl ResponseEnvelope {
    /// Empty envelope of the given kind
    #[must_use]
    pub fn new(kind: EnvelopeKind) -> Self {
        Self {
            kind,
            request_id: None,
            conversation_id: None,
            user_id: None,
            user_message: None,
            ai_response: None,
            results: Vec::new(),
            next_request_suggestions: Vec::new(),
            requires_confirmation: None,
            confirmation_context: None,
            status: None,
            error: None,
            timestamp: Utc::now().timestamp_millis(),
            processing_time_ms: None,
        }
    }

    /// Envelope addressed to a request
    #[must_use]
    pub fn for_request(kind: EnvelopeKind, request: &PromptRequest, user_id: &str) -> Self {
        Self {
            request_id: Some(request.request_id.clone()),
            conversation_id: Some(request.conversation_id.clone()),
            user_id: Some(user_id.to_string()),
            ..Self::new(kind)
        }
    }

    /// Session keep-alive
    #[must_use]
    pub fn heartbeat(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            ..Self::new(EnvelopeKind::Processing)
        }
        .with_status(status::HEARTBEAT)
    }

    /// Error not tied to an accepted request (parse/auth/empty message)
    #[must_use]
    pub fn rejection(request_id: Option<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            request_id,
            error: Some(message.into()),
            status: Some(code.to_string()),
            ..Self::new(EnvelopeKind::Error)
        }
    }

    /// Set the status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the assistant text
    #[must_use]
    pub fn with_ai_response(mut self, text: impl Into<String>) -> Self {
        self.ai_response = Some(text.into());
        self
    }

    /// Set the error text
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the elapsed time
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.processing_time_ms = Some(elapsed.as_millis() as u64);
        self
    }

    /// Whether this envelope ends its request
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
