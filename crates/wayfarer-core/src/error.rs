//! Error types for wayfarer-core
//!
//! One taxonomy covers the whole pipeline. Every variant maps to a
//! user-safe message through [`UserFriendlyError`]; the `Display` text is
//! for server-side logs only and may carry internal detail.

use crate::security::scope::REFUSAL_MESSAGE;
use thiserror::Error;

/// Close code sent when a connection violates the authentication policy
pub const POLICY_VIOLATION_CLOSE_CODE: u16 = 1008;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed inbound frame; the session stays open
    #[error("invalid request frame: {0}")]
    Parse(String),

    /// Prompt text empty after trimming
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Missing or invalid identity
    #[error("authentication error: {0}")]
    Auth(String),

    /// Input blocked by content validation
    #[error("input rejected: {}", .violations.join("; "))]
    ValidationRejected {
        /// Ordered violation descriptions
        violations: Vec<String>,
    },

    /// Input outside the travel/booking domain
    #[error("out of scope: {reason}")]
    ScopeRejected {
        /// Reason code of the scope verdict
        reason: String,
    },

    /// Model or tool invocation failed
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Model provider error
    #[error("llm error: {0}")]
    Llm(#[from] wayfarer_llm::Error),

    /// Write to a closed or broken connection
    #[error("transport error: {0}")]
    Transport(String),

    /// Conversation memory error
    #[error("memory error: {0}")]
    Memory(String),

    /// Token refresh or tool connection error
    #[error("credential error: {0}")]
    Credential(String),

    /// Configuration error (invalid settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error (serialization, task failures, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error came from the model/tool side of the pipeline
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream(_) | Error::Llm(_) | Error::Credential(_))
    }

    /// Whether the error was produced by a gate before any model call
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::ValidationRejected { .. } | Error::ScopeRejected { .. }
        )
    }

    /// Stable machine-readable code sent in the envelope `status` field
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse(_) => "INVALID_REQUEST",
            Error::EmptyMessage => "EMPTY_MESSAGE",
            Error::Auth(_) => "UNAUTHORIZED",
            Error::ValidationRejected { .. } => "VALIDATION_REJECTED",
            Error::ScopeRejected { .. } => "OUT_OF_SCOPE",
            Error::Upstream(_) | Error::Llm(_) | Error::Credential(_) => "UPSTREAM_FAILURE",
            Error::Transport(_) => "TRANSPORT_FAILURE",
            Error::Memory(_) | Error::Configuration(_) | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Messages are bilingual (English, then Korean) and never include
/// internal detail.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for what the user can do next
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Parse(_) => {
                "Invalid request format. / 요청 형식이 올바르지 않습니다.".to_string()
            }
            Error::EmptyMessage => {
                "Message cannot be empty. / 메시지를 입력해 주세요.".to_string()
            }
            Error::Auth(_) => "Authentication required. / 인증이 필요합니다.".to_string(),
            Error::ValidationRejected { violations } => format!(
                "Your message can't be processed ({}). / 요청을 처리할 수 없습니다.",
                violations.join(", ")
            ),
            Error::ScopeRejected { .. } => REFUSAL_MESSAGE.to_string(),
            Error::Upstream(_) | Error::Llm(_) | Error::Credential(_) => {
                "The assistant is temporarily unavailable. Please try again. / \
                 일시적으로 응답할 수 없습니다. 잠시 후 다시 시도해 주세요."
                    .to_string()
            }
            Error::Transport(_) => {
                "Connection problem. / 연결에 문제가 발생했습니다.".to_string()
            }
            Error::Memory(_) | Error::Configuration(_) | Error::Internal(_) => {
                "An internal error occurred. / 내부 오류가 발생했습니다.".to_string()
            }
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::ValidationRejected { .. } => Some(
                "Ask about flights, hotels, bookings or travel plans. / \
                 항공, 호텔, 예약, 여행 일정에 대해 질문해 주세요."
                    .to_string(),
            ),
            Error::Upstream(_) | Error::Llm(_) => Some(
                "Your conversation history is saved; resend the message to retry. / \
                 대화 기록은 저장되어 있으니 메시지를 다시 보내 주세요."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Format an error for display in a chat envelope
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}

#[cfg(test)]
mod tests;
