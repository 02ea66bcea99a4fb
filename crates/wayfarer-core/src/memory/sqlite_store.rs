//! SQLite conversation store
//!
//! Turns are stored one row each, ordered by an autoincrement id, in a WAL
//! database. The parent directory is created when missing.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use wayfarer_llm::MessageRole;

use super::{ConversationKey, ConversationStore, ConversationTurn};
use crate::error::{Error, Result};

/// SQLite-backed conversation store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    ///
    /// # Errors
    ///
    /// Returns error if database creation or migration fails.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Memory(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Memory(format!("Invalid SQLite path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Memory(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite conversation store initialized");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                principal TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Memory(format!("Failed to create turns table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_turns_conversation
            ON conversation_turns(principal, conversation_id, id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Memory(format!("Failed to create index: {}", e)))?;

        debug!("SQLite conversation schema initialized");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Memory(format!("Health check failed: {}", e)))?;
        Ok(true)
    }
}

fn decode_turn((role, content, created_at): (String, String, String)) -> Result<ConversationTurn> {
    let role = MessageRole::from_str(&role).map_err(Error::Memory)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Memory(format!("Invalid turn timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(ConversationTurn {
        role,
        content,
        created_at,
    })
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self, key: &ConversationKey, limit: usize) -> Result<Vec<ConversationTurn>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT role, content, created_at FROM conversation_turns
            WHERE principal = ? AND conversation_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(&key.principal)
        .bind(&key.conversation_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Memory(format!("Failed to load turns: {}", e)))?;

        let mut turns = rows.into_iter().map(decode_turn).collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn append(&self, key: &ConversationKey, turns: &[ConversationTurn]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Memory(format!("Failed to begin transaction: {}", e)))?;

        for turn in turns {
            sqlx::query(
                r#"
                INSERT INTO conversation_turns (principal, conversation_id, role, content, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.principal)
            .bind(&key.conversation_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Memory(format!("Failed to append turn: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Memory(format!("Failed to commit turns: {}", e)))?;

        debug!(conversation = %key, turns = turns.len(), "Turns appended");
        Ok(())
    }

    async fn count(&self, key: &ConversationKey) -> Result<usize> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversation_turns WHERE principal = ? AND conversation_id = ?",
        )
        .bind(&key.principal)
        .bind(&key.conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Memory(format!("Failed to count turns: {}", e)))?;

        Ok(row.0 as usize)
    }
}
