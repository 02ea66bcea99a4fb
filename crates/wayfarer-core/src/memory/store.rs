//! In-process conversation store

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ConversationKey, ConversationStore, ConversationTurn};
use crate::error::Result;

/// Conversation store held in memory; contents are lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: DashMap<ConversationKey, Vec<ConversationTurn>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, key: &ConversationKey, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .conversations
            .get(key)
            .map(|turns| {
                let skip = turns.len().saturating_sub(limit);
                turns[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn append(&self, key: &ConversationKey, turns: &[ConversationTurn]) -> Result<()> {
        self.conversations
            .entry(key.clone())
            .or_default()
            .extend_from_slice(turns);
        Ok(())
    }

    async fn count(&self, key: &ConversationKey) -> Result<usize> {
        Ok(self.conversations.get(key).map_or(0, |turns| turns.len()))
    }
}
