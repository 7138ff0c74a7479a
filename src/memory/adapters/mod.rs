//! Durable history backends consulted on cache miss.
//!
//! Each adapter is read-only: it turns a conversation id into a
//! chronologically ordered message list, and returns an empty list when the
//! backend has no records for that id. Writing durable records is the
//! calling pipeline's responsibility, never this subsystem's.
//!
//! Adapters are registered with a [`ServiceRegistry`] under well-known keys;
//! a tier whose key is absent is simply not deployed.

mod document;
mod memory;
mod relational;

pub use document::DocumentHistoryStore;
pub use memory::MemoryHistoryStore;
pub use relational::RelationalHistoryStore;

use async_trait::async_trait;
use tracing::debug;

use super::message::Message;
use crate::config::MemoryConfig;
use crate::error::Result;
use crate::registry::{Service, ServiceRegistry};

/// Registry key for the document-oriented tier.
pub const DOCUMENT_STORE_KEY: &str = "document_store";

/// Registry key for the relational tier.
pub const RELATIONAL_STORE_KEY: &str = "relational_store";

/// Read-only durable history source.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Load the full history for a conversation, ordered by timestamp
    /// ascending. An id with no records yields an empty list; an unreachable
    /// backend yields [`Error::BackendUnavailable`](crate::Error::BackendUnavailable),
    /// which the orchestrator absorbs into the same empty result.
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>>;
}

/// A durable adapter, selected at registration time.
pub enum HistoryAdapter {
    /// Document-oriented tier (MongoDB)
    Document(DocumentHistoryStore),
    /// Relational tier (SQLite)
    Relational(RelationalHistoryStore),
    /// In-process stand-in for development and tests
    Memory(MemoryHistoryStore),
}

#[async_trait]
impl HistoryBackend for HistoryAdapter {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        match self {
            Self::Document(store) => store.load_history(conversation_id).await,
            Self::Relational(store) => store.load_history(conversation_id).await,
            Self::Memory(store) => store.load_history(conversation_id).await,
        }
    }
}

#[async_trait]
impl Service for HistoryAdapter {
    async fn initialize(&self) -> Result<()> {
        match self {
            Self::Document(store) => store.initialize().await,
            Self::Relational(store) => store.initialize().await,
            Self::Memory(store) => store.initialize().await,
        }
    }

    async fn shutdown(&self) -> Result<()> {
        match self {
            Self::Document(store) => store.shutdown().await,
            Self::Relational(store) => store.shutdown().await,
            Self::Memory(store) => store.shutdown().await,
        }
    }
}

/// Register the enabled durable tiers under their well-known keys.
///
/// A disabled tier is never registered, so `registry.has(key)` reports it as
/// not deployed.
///
/// # Errors
///
/// Returns [`Error::DuplicateService`](crate::Error::DuplicateService) if a
/// key was already registered.
pub async fn register_backends(
    registry: &ServiceRegistry<HistoryAdapter>,
    config: &MemoryConfig,
) -> Result<()> {
    if config.document_store.enabled {
        let store_config = config.document_store.clone();
        registry
            .register(DOCUMENT_STORE_KEY, move || {
                HistoryAdapter::Document(DocumentHistoryStore::new(store_config.clone()))
            })
            .await?;
    } else {
        debug!("document store disabled, not registering");
    }

    if config.relational_store.enabled {
        let store_config = config.relational_store.clone();
        registry
            .register(RELATIONAL_STORE_KEY, move || {
                HistoryAdapter::Relational(RelationalHistoryStore::new(store_config.clone()))
            })
            .await?;
    } else {
        debug!("relational store disabled, not registering");
    }

    Ok(())
}
