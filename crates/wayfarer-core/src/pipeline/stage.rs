//! Pipeline stage seam
//!
//! A stage has a before-hook that runs on the way to the model and an
//! after-hook that runs once a reply exists. Before-hooks run in
//! registration order and the first `Err` stops the request; after-hooks
//! run in reverse order.

use async_trait::async_trait;
use tokio::time::Instant;
use wayfarer_llm::{Message, PendingConfirmation};

use crate::envelope::PromptRequest;
use crate::error::Result;
use crate::security::{ScopeVerdict, ValidationVerdict};

/// Per-request state threaded through the stages
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Accepted request
    pub request: PromptRequest,
    /// Display principal (conversation partition)
    pub user_id: String,
    /// Authorization subject forwarded to tool calls
    pub subject_id: String,
    /// Prompt text as it will be sent to the model
    pub prompt: String,
    /// Validation verdict, once computed
    pub validation: Option<ValidationVerdict>,
    /// Scope verdict, once computed
    pub scope: Option<ScopeVerdict>,
    /// Prior turns, oldest first
    pub history: Vec<Message>,
    /// When the request was accepted
    pub started_at: Instant,
}

impl PipelineContext {
    /// Create a context for an accepted request
    #[must_use]
    pub fn new(
        request: PromptRequest,
        user_id: impl Into<String>,
        subject_id: impl Into<String>,
    ) -> Self {
        let prompt = request.message.clone();
        Self {
            request,
            user_id: user_id.into(),
            subject_id: subject_id.into(),
            prompt,
            validation: None,
            scope: None,
            history: Vec::new(),
            started_at: Instant::now(),
        }
    }
}

/// Aggregated model output for one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalReply {
    /// Authoritative assistant text
    pub text: String,
    /// Structured result items
    pub results: Vec<serde_json::Value>,
    /// Follow-up suggestions
    pub suggestions: Vec<String>,
    /// Operation awaiting user approval
    pub confirmation: Option<PendingConfirmation>,
}

/// A named pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name used in logs
    fn name(&self) -> &'static str;

    /// Runs before the model call
    async fn before(&self, ctx: &mut PipelineContext) -> Result<()>;

    /// Runs after a successful reply
    async fn after(&self, _ctx: &PipelineContext, _reply: &FinalReply) -> Result<()> {
        Ok(())
    }
}
