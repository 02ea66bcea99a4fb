//! Request pipeline
//!
//! Runs the ordered stages for one request, invokes the model, drains its
//! stream into a single reply and turns the outcome into exactly one
//! terminal envelope.

mod aggregator;
mod stage;

pub use aggregator::{drain, Aggregator};
pub use stage::{FinalReply, PipelineContext, Stage};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use wayfarer_llm::{ChatModel, ChatRequest, Message, SharedToolTransport};

use crate::envelope::{status, EnvelopeKind, ResponseEnvelope};
use crate::error::{format_error_for_chat, Error, Result};

/// Destination for envelopes produced while a request runs
#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    /// Deliver one envelope; delivery failures are handled by the sink
    async fn emit(&self, envelope: ResponseEnvelope);
}

/// Source of the tool connections attached to each model request
pub trait ToolProvider: Send + Sync {
    /// Current tool set
    fn tools(&self) -> Vec<SharedToolTransport>;
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on one model invocation, stream included
    pub model_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: 300,
        }
    }
}

/// Ordered stages around one model
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    model: Arc<dyn ChatModel>,
    tools: Option<Arc<dyn ToolProvider>>,
    system_prompt: Option<String>,
    model_timeout: Duration,
}

impl Pipeline {
    /// Create a pipeline with no stages
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, config: &PipelineConfig) -> Self {
        Self {
            stages: Vec::new(),
            model,
            tools: None,
            system_prompt: None,
            model_timeout: Duration::from_secs(config.model_timeout_secs),
        }
    }

    /// Append a stage; stages run in the order they are added
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Attach a tool provider
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Stage names in execution order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run a request to completion and return its terminal envelope
    ///
    /// Intermediate STREAM_UPDATE envelopes go to `sink`; the terminal
    /// envelope is returned so the caller can stop its timers first.
    pub async fn execute(&self, mut ctx: PipelineContext, sink: &dyn EnvelopeSink) -> ResponseEnvelope {
        let request_id = ctx.request.request_id.clone();

        match self.run(&mut ctx, sink).await {
            Ok(reply) => {
                info!(
                    request_id = %request_id,
                    elapsed_ms = ctx.started_at.elapsed().as_millis() as u64,
                    confirmation = reply.confirmation.is_some(),
                    "Request completed"
                );
                response_envelope(&ctx, reply)
            }
            Err(err) => {
                if err.is_rejection() {
                    info!(request_id = %request_id, code = err.code(), "Request rejected: {}", err);
                } else {
                    error!(request_id = %request_id, code = err.code(), "Request failed: {}", err);
                }
                ResponseEnvelope::for_request(EnvelopeKind::Error, &ctx.request, &ctx.user_id)
                    .with_error(format_error_for_chat(&err))
                    .with_status(err.code())
                    .with_elapsed(ctx.started_at.elapsed())
            }
        }
    }

    async fn run(&self, ctx: &mut PipelineContext, sink: &dyn EnvelopeSink) -> Result<FinalReply> {
        for stage in &self.stages {
            debug!(request_id = %ctx.request.request_id, stage = stage.name(), "Running stage");
            stage.before(ctx).await?;
        }

        let mut messages = ctx.history.clone();
        messages.push(Message::user(ctx.prompt.clone()));

        let mut request = ChatRequest::new(&ctx.request.conversation_id, &ctx.subject_id)
            .with_messages(messages);
        if let Some(prompt) = &self.system_prompt {
            request = request.with_system_prompt(prompt.clone());
        }
        if let Some(tools) = &self.tools {
            request = request.with_tools(tools.tools());
        }

        let reply = tokio::time::timeout(self.model_timeout, self.invoke(request, ctx, sink))
            .await
            .map_err(|_| {
                Error::Upstream(format!(
                    "model invocation timed out after {}s",
                    self.model_timeout.as_secs()
                ))
            })??;

        for stage in self.stages.iter().rev() {
            if let Err(err) = stage.after(ctx, &reply).await {
                error!(
                    request_id = %ctx.request.request_id,
                    stage = stage.name(),
                    "After-hook failed, reply still delivered: {}",
                    err
                );
            }
        }

        Ok(reply)
    }

    async fn invoke(
        &self,
        request: ChatRequest,
        ctx: &PipelineContext,
        sink: &dyn EnvelopeSink,
    ) -> Result<FinalReply> {
        debug!(
            request_id = %ctx.request.request_id,
            model = self.model.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Invoking model"
        );

        let stream = self.model.stream(request).await?;
        drain(stream, sink, ctx).await
    }
}

fn response_envelope(ctx: &PipelineContext, reply: FinalReply) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::for_request(EnvelopeKind::Response, &ctx.request, &ctx.user_id);

    if reply.text.is_empty() {
        warn!(request_id = %ctx.request.request_id, "Model completed with empty text");
    }

    let status = if reply.confirmation.is_some() {
        status::AWAITING_CONFIRMATION
    } else {
        status::COMPLETED
    };

    envelope.user_message = Some(ctx.request.message.clone());
    envelope.ai_response = Some(reply.text);
    envelope.results = reply.results;
    envelope.next_request_suggestions = reply.suggestions;
    envelope.requires_confirmation = Some(reply.confirmation.is_some());
    envelope.confirmation_context = reply.confirmation;
    envelope.with_status(status).with_elapsed(ctx.started_at.elapsed())
}
