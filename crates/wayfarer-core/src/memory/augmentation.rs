//! History replay and persistence stage

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wayfarer_llm::MessageRole;

use super::{ConversationKey, ConversationStore, ConversationTurn};
use crate::error::Result;
use crate::pipeline::{FinalReply, PipelineContext, Stage};

/// Prepends prior dialogue to the request and records each exchange
pub struct MemoryAugmentationStage {
    store: Arc<dyn ConversationStore>,
    history_limit: usize,
}

impl MemoryAugmentationStage {
    /// Create the stage over a store
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    fn key(ctx: &PipelineContext) -> ConversationKey {
        ConversationKey::new(&ctx.user_id, &ctx.request.conversation_id)
    }
}

#[async_trait]
impl Stage for MemoryAugmentationStage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn before(&self, ctx: &mut PipelineContext) -> Result<()> {
        let key = Self::key(ctx);
        let turns = self.store.load(&key, self.history_limit).await?;

        ctx.history = turns
            .iter()
            .filter(|t| t.role.is_dialogue())
            .map(ConversationTurn::to_message)
            .collect();

        debug!(
            conversation = %key,
            loaded = turns.len(),
            replayed = ctx.history.len(),
            "History attached"
        );
        Ok(())
    }

    async fn after(&self, ctx: &PipelineContext, reply: &FinalReply) -> Result<()> {
        if reply.text.trim().is_empty() {
            return Ok(());
        }

        let key = Self::key(ctx);
        self.store
            .append(
                &key,
                &[
                    ConversationTurn::new(MessageRole::User, ctx.prompt.clone()),
                    ConversationTurn::new(MessageRole::Assistant, reply.text.clone()),
                ],
            )
            .await
    }
}
