//! Utility modules for wayfarer-core
//!
//! - retry: Exponential backoff for token refresh

mod retry;

pub use retry::{retry_with_backoff, RetryConfig, RetryError};
