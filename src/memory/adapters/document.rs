//! Document-oriented durable history adapter (MongoDB).
//!
//! Layout: one document per conversation in a configurable collection,
//! `{ conversation_id, messages: [{ role, content, created_at }] }`, with
//! `created_at` stored as epoch milliseconds. The adapter never writes;
//! documents are produced by the calling pipeline.

use async_trait::async_trait;
use chrono::DateTime;
use mongodb::bson::doc;
use mongodb::{Client, Database};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::HistoryBackend;
use crate::config::DocumentStoreConfig;
use crate::error::{Error, Result};
use crate::memory::message::{Message, MessageRole};
use crate::registry::Service;

#[derive(Debug, Deserialize)]
struct ConversationDocument {
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Deserialize)]
struct StoredMessage {
    role: String,
    content: String,
    /// Epoch milliseconds
    created_at: i64,
}

#[derive(Default)]
struct DocumentState {
    client: Option<Client>,
    database: Option<Database>,
}

/// MongoDB-backed history adapter.
pub struct DocumentHistoryStore {
    config: DocumentStoreConfig,
    state: RwLock<DocumentState>,
}

impl DocumentHistoryStore {
    /// Create an unconnected adapter; the registry connects it on first use.
    #[must_use]
    pub fn new(config: DocumentStoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(DocumentState::default()),
        }
    }
}

#[async_trait]
impl Service for DocumentHistoryStore {
    async fn initialize(&self) -> Result<()> {
        let client = Client::with_uri_str(&self.config.uri)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("MongoDB connection failed: {}", e)))?;
        let database = client.database(&self.config.database);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::BackendUnavailable(format!("MongoDB ping failed: {}", e)))?;

        info!(
            database = %self.config.database,
            collection = %self.config.collection,
            "document history store connected"
        );

        let mut state = self.state.write().await;
        state.client = Some(client);
        state.database = Some(database);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.database = None;
        if let Some(client) = state.client.take() {
            client.shutdown().await;
            info!("document history store closed");
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for DocumentHistoryStore {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let state = self.state.read().await;
        let database = state.database.as_ref().ok_or_else(|| {
            Error::BackendUnavailable("document store not initialized".to_string())
        })?;

        let collection = database.collection::<ConversationDocument>(&self.config.collection);
        let document = collection
            .find_one(doc! { "conversation_id": conversation_id })
            .await
            .map_err(|e| Error::BackendUnavailable(format!("MongoDB query failed: {}", e)))?;

        let Some(document) = document else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<Message> = document
            .messages
            .into_iter()
            .filter_map(|stored| {
                // Unknown roles and unrepresentable timestamps are skipped,
                // not fatal: the rest of the conversation is still usable.
                let role = MessageRole::parse(&stored.role)?;
                let timestamp = DateTime::from_timestamp_millis(stored.created_at)?;
                Some(Message::with_timestamp(role, stored.content, timestamp))
            })
            .collect();
        messages.sort_by_key(|message| message.timestamp);

        debug!(
            conversation_id = %conversation_id,
            count = messages.len(),
            "history loaded from document store"
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uninitialized_store_reports_unavailable() {
        let store = DocumentHistoryStore::new(DocumentStoreConfig::default());
        assert!(matches!(
            store.load_history("c1").await,
            Err(Error::BackendUnavailable(_))
        ));
    }

    // MongoDB tests require a running instance.
    // Run with: cargo test --features mongo-tests
    #[cfg(feature = "mongo-tests")]
    mod mongo_tests {
        use super::*;
        use mongodb::bson::Document;

        #[tokio::test]
        async fn loads_messages_ordered_by_timestamp() {
            let config = DocumentStoreConfig {
                enabled: true,
                database: "mneme_test".to_string(),
                ..DocumentStoreConfig::default()
            };
            let id = crate::memory::generate_conversation_id();

            let client = Client::with_uri_str(&config.uri).await.unwrap();
            let collection = client
                .database(&config.database)
                .collection::<Document>(&config.collection);
            collection
                .insert_one(doc! {
                    "conversation_id": &id,
                    "messages": [
                        { "role": "assistant", "content": "hello", "created_at": 2000_i64 },
                        { "role": "user", "content": "hi", "created_at": 1000_i64 },
                    ],
                })
                .await
                .unwrap();

            let store = DocumentHistoryStore::new(config);
            store.initialize().await.unwrap();

            let history = store.load_history(&id).await.unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].content, "hi");
            assert_eq!(history[1].content, "hello");

            collection
                .delete_one(doc! { "conversation_id": &id })
                .await
                .unwrap();
            store.shutdown().await.unwrap();
        }
    }
}
