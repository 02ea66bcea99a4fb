//! Chat model trait definition

use crate::completion::{ChatRequest, ChatStream};
use crate::error::Result;

/// Trait for streaming chat model backends
///
/// `stream` returns once the upstream call has been accepted; output then
/// arrives on the returned channel. Dropping the receiver abandons the
/// stream.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Start a streaming completion
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream>;
}
