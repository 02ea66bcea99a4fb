//! Conversation memory
//!
//! Durable per-conversation turn history, partitioned by principal:
//! - `ConversationStore`: storage seam
//! - `MemoryStore`: in-process backend (tests, development)
//! - `SqliteStore`: persistent backend
//! - `MemoryAugmentationStage`: replays history into the model request
//!   and records each completed exchange

mod augmentation;
mod sqlite_store;
mod store;

pub use augmentation::MemoryAugmentationStage;
pub use sqlite_store::SqliteStore;
pub use store::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfarer_llm::{Message, MessageRole};

use crate::error::{Error, Result};

/// History is keyed by principal and conversation id, so two principals
/// reusing a conversation id never share turns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// Display principal
    pub principal: String,
    /// Conversation id
    pub conversation_id: String,
}

impl ConversationKey {
    /// Create a key
    #[must_use]
    pub fn new(principal: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.principal, self.conversation_id)
    }
}

/// One stored turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Speaker role
    pub role: MessageRole,
    /// Turn text
    pub content: String,
    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn stamped now
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Convert into a model message
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

/// Conversation storage backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the most recent `limit` turns, oldest first
    async fn load(&self, key: &ConversationKey, limit: usize) -> Result<Vec<ConversationTurn>>;

    /// Append turns in order
    async fn append(&self, key: &ConversationKey, turns: &[ConversationTurn]) -> Result<()>;

    /// Number of stored turns for a conversation
    async fn count(&self, key: &ConversationKey) -> Result<usize>;
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Backend: "sqlite" or "memory"
    pub backend: String,
    /// SQLite database path
    pub path: String,
    /// Maximum turns replayed per request
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: "data/conversations.db".to_string(),
            history_limit: 50,
        }
    }
}

/// Open the configured backend
pub async fn open_store(config: &MemoryConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.path).await?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(Error::Configuration(format!(
            "Unknown memory backend: '{}'. Use 'sqlite' or 'memory'.",
            other
        ))),
    }
}
