//! Tool transport handles
//!
//! A tool transport is the live connection to one downstream tool service.
//! Transports are built with a credential snapshot and are replaced, never
//! mutated, when credentials rotate.

use crate::error::Result;
use std::sync::Arc;

/// A connection to a downstream tool service
#[async_trait::async_trait]
pub trait ToolTransport: Send + Sync {
    /// Logical key of the tool service
    fn key(&self) -> &str;

    /// Invoke an operation on behalf of an authorization subject
    async fn call(
        &self,
        subject_id: &str,
        operation: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}

/// Shared tool transport handle
pub type SharedToolTransport = Arc<dyn ToolTransport>;
