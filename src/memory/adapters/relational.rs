//! Relational durable history adapter (SQLite via sqlx).
//!
//! Layout: one row per message in `conversation_history`, ordered by an
//! RFC 3339 `created_at` column. The adapter never writes message rows;
//! it creates the schema on initialize so a fresh database is readable.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::HistoryBackend;
use crate::config::RelationalStoreConfig;
use crate::error::{Error, Result};
use crate::memory::message::{Message, MessageRole};
use crate::registry::Service;

/// SQLite-backed history adapter.
pub struct RelationalHistoryStore {
    config: RelationalStoreConfig,
    pool: RwLock<Option<SqlitePool>>,
}

impl RelationalHistoryStore {
    /// Create an unconnected adapter; the registry connects it on first use.
    #[must_use]
    pub fn new(config: RelationalStoreConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::BackendUnavailable(format!("schema creation failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_history_conversation_created
            ON conversation_history(conversation_id, created_at)
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| Error::BackendUnavailable(format!("index creation failed: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Service for RelationalHistoryStore {
    async fn initialize(&self) -> Result<()> {
        let path = self.config.database_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::BackendUnavailable(format!(
                    "cannot create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Configuration(format!("invalid database path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("SQLite connection failed: {}", e)))?;

        Self::init_schema(&pool).await?;
        info!(path = %path.display(), "relational history store connected");

        *self.pool.write().await = Some(pool);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            info!("relational history store closed");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for RelationalHistoryStore {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let pool = self.pool.read().await;
        let pool = pool.as_ref().ok_or_else(|| {
            Error::BackendUnavailable("relational store not initialized".to_string())
        })?;

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT role, content, created_at
            FROM conversation_history
            WHERE conversation_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::BackendUnavailable(format!("SQLite query failed: {}", e)))?;

        let messages: Vec<Message> = rows
            .into_iter()
            .filter_map(|(role, content, created_at)| {
                let Some(role) = MessageRole::parse(&role) else {
                    warn!(role = %role, "skipping row with unknown role");
                    return None;
                };
                let timestamp = match DateTime::parse_from_rfc3339(&created_at) {
                    Ok(parsed) => parsed.with_timezone(&Utc),
                    Err(e) => {
                        warn!(created_at = %created_at, error = %e, "skipping row with bad timestamp");
                        return None;
                    }
                };
                Some(Message::with_timestamp(role, content, timestamp))
            })
            .collect();

        debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "history loaded from relational store"
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_config(dir: &tempfile::TempDir) -> RelationalStoreConfig {
        RelationalStoreConfig {
            enabled: true,
            path: Some(dir.path().join("history.db")),
        }
    }

    async fn insert_row(
        pool: &SqlitePool,
        conversation_id: &str,
        role: &str,
        content: &str,
        created_at: &str,
    ) {
        sqlx::query(
            "INSERT INTO conversation_history (conversation_id, role, content, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn uninitialized_store_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalHistoryStore::new(temp_config(&dir));
        assert!(matches!(
            store.load_history("c1").await,
            Err(Error::BackendUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn empty_database_yields_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalHistoryStore::new(temp_config(&dir));
        store.initialize().await.unwrap();

        let history = store.load_history("missing").await.unwrap();
        assert!(history.is_empty());
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn loads_rows_in_created_at_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalHistoryStore::new(temp_config(&dir));
        store.initialize().await.unwrap();

        {
            let guard = store.pool.read().await;
            let pool = guard.as_ref().unwrap();
            insert_row(pool, "c1", "assistant", "second", "2024-01-01T00:00:02Z").await;
            insert_row(pool, "c1", "user", "first", "2024-01-01T00:00:01Z").await;
            insert_row(pool, "c2", "user", "other", "2024-01-01T00:00:00Z").await;
        }

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].content, "second");
        assert_eq!(
            history[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap()
        );
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = RelationalHistoryStore::new(temp_config(&dir));
        store.initialize().await.unwrap();

        {
            let guard = store.pool.read().await;
            let pool = guard.as_ref().unwrap();
            insert_row(pool, "c1", "user", "ok", "2024-01-01T00:00:01Z").await;
            insert_row(pool, "c1", "tool", "bad role", "2024-01-01T00:00:02Z").await;
            insert_row(pool, "c1", "user", "bad time", "not-a-timestamp").await;
        }

        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "ok");
        store.shutdown().await.unwrap();
    }
}
