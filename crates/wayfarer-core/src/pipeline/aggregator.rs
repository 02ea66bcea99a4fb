//! Stream aggregation
//!
//! Merges ordered deltas into one buffer, forwarding the running text as
//! STREAM_UPDATE envelopes, and produces the final reply when the upstream
//! signals completion.

use tracing::{debug, warn};
use wayfarer_llm::{ChatStream, Completion, StreamEvent};

use super::{EnvelopeSink, FinalReply, PipelineContext};
use crate::envelope::{EnvelopeKind, ResponseEnvelope};
use crate::error::{Error, Result};

/// Accumulates streamed text for one request
#[derive(Debug, Default)]
pub struct Aggregator {
    buffer: String,
    chunks: usize,
}

impl Aggregator {
    /// Create an empty aggregator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a delta; returns the accumulated text when the delta was
    /// non-empty
    pub fn push(&mut self, delta: &str) -> Option<&str> {
        if delta.is_empty() {
            return None;
        }
        self.buffer.push_str(delta);
        self.chunks += 1;
        Some(&self.buffer)
    }

    /// Number of non-empty deltas merged so far
    #[must_use]
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Build the reply; completion text wins over the buffer when present
    #[must_use]
    pub fn finish(self, completion: Completion) -> FinalReply {
        let text = match completion.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => self.buffer,
        };

        FinalReply {
            text,
            results: completion.results,
            suggestions: completion.suggestions,
            confirmation: completion.confirmation,
        }
    }
}

/// Drain a model stream, emitting STREAM_UPDATE envelopes to `sink`
///
/// # Errors
///
/// Returns `Error::Upstream` when the stream yields an error item or closes
/// without a completion event.
pub async fn drain(
    mut stream: ChatStream,
    sink: &dyn EnvelopeSink,
    ctx: &PipelineContext,
) -> Result<FinalReply> {
    let mut aggregator = Aggregator::new();

    while let Some(item) = stream.recv().await {
        match item {
            Ok(StreamEvent::Delta(delta)) => {
                if let Some(text) = aggregator.push(&delta) {
                    let update = ResponseEnvelope::for_request(
                        EnvelopeKind::StreamUpdate,
                        &ctx.request,
                        &ctx.user_id,
                    )
                    .with_ai_response(text)
                    .with_elapsed(ctx.started_at.elapsed());
                    sink.emit(update).await;
                }
            }
            Ok(StreamEvent::Completed(completion)) => {
                debug!(
                    request_id = %ctx.request.request_id,
                    chunks = aggregator.chunks(),
                    "Stream completed"
                );
                return Ok(aggregator.finish(completion));
            }
            Err(err) => {
                warn!(
                    request_id = %ctx.request.request_id,
                    chunks = aggregator.chunks(),
                    "Stream failed: {}",
                    err
                );
                return Err(Error::Upstream(err.to_string()));
            }
        }
    }

    Err(Error::Upstream(format!(
        "stream ended without completion after {} chunks",
        aggregator.chunks()
    )))
}

#[cfg(test)]
mod tests;
