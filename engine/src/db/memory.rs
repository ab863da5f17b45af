//! Conversation Memory Repository
//!
//! Stores every completed exchange, provides full-text search over them so
//! the retriever can pull relevant past turns into the next prompt, and keeps
//! a small key/value table of facts per user.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::ports::MemoryWritePort;
use sdk::types::{ComponentHealth, TurnRecord};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

/// Facts recorded without a user live under this id.
const ANONYMOUS_USER: i64 = 0;

/// Row counts reported by `parley stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub conversations: i64,
    pub facts: i64,
    pub users: i64,
}

/// Repository for conversation memory and user facts
#[derive(Clone)]
pub struct MemoryStore {
    pool: SqlitePool,
}

/// Turn free text into an FTS5 query of quoted OR terms.
///
/// FTS5 treats `"`, `*`, `:`, `-`, `NEAR` and friends as syntax, so raw user
/// text cannot be passed to MATCH. Only alphanumeric runs survive; each is
/// quoted. Returns `None` when nothing searchable is left.
pub fn sanitize_fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl MemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one exchange. Returns the new row id.
    pub async fn store_conversation(&self, record: &TurnRecord) -> Result<i64> {
        let context = serde_json::json!({ "context": record.context }).to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO conversations
                (conversation_id, user_id, agent_id, user_message, assistant_response, context, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.conversation_id)
        .bind(record.user_id)
        .bind(record.agent_id)
        .bind(&record.user_message)
        .bind(&record.assistant_response)
        .bind(context)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert conversation")?;

        Ok(result.last_insert_rowid())
    }

    /// Search past exchanges matching the query text.
    ///
    /// Orders results by FTS bm25 rank, limiting to `limit`. Each hit is
    /// rendered as `User: ...\nAssistant: ...`. With an `agent_id`, exchanges
    /// stored without an agent still match; those tagged with another agent
    /// do not.
    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        user_id: Option<i64>,
        agent_id: Option<i64>,
    ) -> Result<Vec<String>> {
        let Some(fts_query) = sanitize_fts_query(query_text) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT c.user_message, c.assistant_response
            FROM conversations_fts
            JOIN conversations c ON c.id = conversations_fts.rowid
            WHERE conversations_fts MATCH ?
              AND (? IS NULL OR c.user_id = ?)
              AND (? IS NULL OR c.agent_id IS NULL OR c.agent_id = ?)
            ORDER BY bm25(conversations_fts), c.id DESC
            LIMIT ?
            "#,
        )
        .bind(fts_query)
        .bind(user_id)
        .bind(user_id)
        .bind(agent_id)
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to execute FTS query on conversations_fts")?;

        let mut snippets = Vec::with_capacity(rows.len());
        for row in rows {
            let user: String = row.get("user_message");
            let assistant: String = row.get("assistant_response");
            snippets.push(format!("User: {}\nAssistant: {}", user, assistant));
        }

        Ok(snippets)
    }

    /// Insert or replace a fact for a user.
    pub async fn set_fact(&self, user_id: Option<i64>, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO facts (user_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.unwrap_or(ANONYMOUS_USER))
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to store fact")?;

        Ok(())
    }

    /// All facts recorded for a user, keyed and sorted by name.
    pub async fn facts(&self, user_id: Option<i64>) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM facts WHERE user_id = ?")
            .bind(user_id.unwrap_or(ANONYMOUS_USER))
            .fetch_all(&self.pool)
            .await
            .context("Failed to load facts")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    /// Delete a user's conversations and facts, or everything when `None`.
    ///
    /// Returns the number of rows removed.
    pub async fn clear(&self, user_id: Option<i64>) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let (conversations, facts) = match user_id {
            Some(id) => {
                let conversations = sqlx::query("DELETE FROM conversations WHERE user_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete conversations")?;
                let facts = sqlx::query("DELETE FROM facts WHERE user_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete facts")?;
                (conversations, facts)
            }
            None => {
                let conversations = sqlx::query("DELETE FROM conversations")
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete conversations")?;
                let facts = sqlx::query("DELETE FROM facts")
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete facts")?;
                (conversations, facts)
            }
        };

        tx.commit().await.context("Failed to commit clear")?;

        Ok(conversations.rows_affected() + facts.rows_affected())
    }

    pub async fn stats(&self) -> Result<MemoryStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM conversations) AS conversations,
                (SELECT COUNT(*) FROM facts) AS facts,
                (SELECT COUNT(DISTINCT user_id) FROM conversations WHERE user_id IS NOT NULL) AS users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to collect memory stats")?;

        Ok(MemoryStats {
            conversations: row.get("conversations"),
            facts: row.get("facts"),
            users: row.get("users"),
        })
    }

    pub async fn health(&self) -> ComponentHealth {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => ComponentHealth::healthy("memory"),
            Err(e) => ComponentHealth::unhealthy("memory", e.to_string()),
        }
    }
}

#[async_trait]
impl MemoryWritePort for MemoryStore {
    async fn persist(&self, record: &TurnRecord) -> Result<bool, EngineError> {
        self.store_conversation(record)
            .await
            .map(|_| true)
            .map_err(|e| EngineError::Memory(format!("{:#}", e)))
    }

    async fn clear(&self, user_id: Option<i64>) -> Result<bool, EngineError> {
        let removed = MemoryStore::clear(self, user_id)
            .await
            .map_err(|e| EngineError::Memory(format!("{:#}", e)))?;
        tracing::info!(?user_id, removed, "Cleared conversation memory");
        Ok(true)
    }
}
