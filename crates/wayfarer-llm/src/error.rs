//! Error types for wayfarer-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The stream closed before a completion event arrived
    #[error("stream ended before completion")]
    StreamTruncated,

    /// Tool transport error
    #[error("tool error: {0}")]
    Tool(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
