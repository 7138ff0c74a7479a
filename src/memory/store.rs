//! Tiered session memory orchestrator.
//!
//! [`SessionMemoryStore`] answers every read from the cache tier when it can,
//! falls back through the registered durable adapters (document first, then
//! relational) on a miss, and writes recovered history back into the cache so
//! the next read is cheap. Durable tiers are optional; when none are deployed
//! a miss degrades to an empty conversation rather than an error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::memory::adapters::{
    register_backends, HistoryAdapter, HistoryBackend, DOCUMENT_STORE_KEY, RELATIONAL_STORE_KEY,
};
use crate::memory::cache::{CacheStore, SessionCache};
use crate::memory::message::{ConversationSummary, Message, StateSnapshot};
use crate::registry::ServiceRegistry;

/// Longest accepted conversation id, in bytes.
const MAX_CONVERSATION_ID_BYTES: usize = 512;

/// Fallback order for durable tiers. The document store holds whole
/// conversations and is preferred over per-row relational reconstruction.
const FALLBACK_ORDER: [(&str, &str); 2] = [
    (DOCUMENT_STORE_KEY, "document"),
    (RELATIONAL_STORE_KEY, "relational"),
];

/// Cache-first conversation history and state store.
pub struct SessionMemoryStore {
    cache: SessionCache,
    registry: Arc<ServiceRegistry<HistoryAdapter>>,
}

impl SessionMemoryStore {
    /// Build a store from pre-assembled parts. Used by tests and by callers
    /// that manage their own registry.
    #[must_use]
    pub fn new(cache: SessionCache, registry: Arc<ServiceRegistry<HistoryAdapter>>) -> Self {
        Self { cache, registry }
    }

    /// Build a store from configuration: pick the cache tier (Redis when
    /// reachable, in-process otherwise) and register the enabled durable
    /// adapters. Adapters connect lazily, on first fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend key is registered twice, which indicates
    /// a configuration bug.
    pub async fn from_config(config: &MemoryConfig) -> Result<Self> {
        let cache = SessionCache::from_config(config).await;
        let registry = Arc::new(ServiceRegistry::new());
        register_backends(&registry, config).await?;
        Ok(Self { cache, registry })
    }

    /// The registry holding this store's durable adapters.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry<HistoryAdapter>> {
        &self.registry
    }

    /// Load conversation history, newest-last.
    ///
    /// Reads the cache first; on a miss, consults the durable tiers in
    /// fallback order and repopulates the cache with whatever they return.
    /// `limit` keeps only the most recent messages, applied after recovery so
    /// the cache still holds the full conversation. `is_new_conversation`
    /// short-circuits everything: a conversation that cannot exist yet is
    /// never looked up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for an empty or oversized id.
    /// Backend failures are absorbed; the worst outcome is an empty history.
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
        is_new_conversation: bool,
    ) -> Result<Vec<Message>> {
        validate_conversation_id(conversation_id)?;

        if is_new_conversation {
            debug!(conversation_id = %conversation_id, "new conversation, skipping lookup");
            return Ok(Vec::new());
        }

        match self.cache.load_history(conversation_id).await {
            // An empty cached list reads as a miss: another writer may have
            // stored `[]` while the durable tiers hold the real history.
            Ok(Some(messages)) if !messages.is_empty() => {
                debug!(
                    conversation_id = %conversation_id,
                    count = messages.len(),
                    "history served from cache"
                );
                return Ok(tail(messages, limit));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "cache read failed, treating as miss");
            }
        }

        let recovered = self.recover_from_durable(conversation_id).await;
        if !recovered.is_empty() {
            if let Err(e) = self.cache.store_history(conversation_id, &recovered).await {
                warn!(conversation_id = %conversation_id, error = %e, "cache repopulation failed");
            }
        }
        Ok(tail(recovered, limit))
    }

    /// Append one message to a conversation's history.
    ///
    /// Cache failures are absorbed: losing one append degrades recall but
    /// must not fail the caller's turn.
    pub async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()> {
        self.add_messages(conversation_id, vec![message]).await
    }

    /// Append several messages atomically, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id; cache I/O
    /// failures are logged and absorbed.
    pub async fn add_messages(&self, conversation_id: &str, messages: Vec<Message>) -> Result<()> {
        validate_conversation_id(conversation_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut history = match self.cache.load_history(conversation_id).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "cache read failed before append");
                Vec::new()
            }
        };
        history.extend(messages);

        if let Err(e) = self.cache.store_history(conversation_id, &history).await {
            warn!(conversation_id = %conversation_id, error = %e, "cache append failed, messages dropped");
        }
        Ok(())
    }

    /// Drop a conversation's cached history. Durable copies are untouched, so
    /// the conversation remains recoverable.
    ///
    /// Returns whether a cached entry existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id; cache I/O
    /// failures are absorbed as `false`.
    pub async fn clear_history(&self, conversation_id: &str) -> Result<bool> {
        validate_conversation_id(conversation_id)?;
        match self.cache.delete_history(conversation_id).await {
            Ok(existed) => {
                info!(conversation_id = %conversation_id, existed, "cached history cleared");
                Ok(existed)
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "cache delete failed");
                Ok(false)
            }
        }
    }

    /// Store a conversation's scratch state, replacing any previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id; cache I/O
    /// failures are absorbed.
    pub async fn save_state(&self, conversation_id: &str, state: &StateSnapshot) -> Result<()> {
        validate_conversation_id(conversation_id)?;
        if let Err(e) = self.cache.store_state(conversation_id, state).await {
            warn!(conversation_id = %conversation_id, error = %e, "state save failed");
        }
        Ok(())
    }

    /// Load a conversation's scratch state. State lives only in the cache;
    /// there is no durable fallback, and a miss or failure reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id.
    pub async fn get_state(&self, conversation_id: &str) -> Result<Option<StateSnapshot>> {
        validate_conversation_id(conversation_id)?;
        match self.cache.load_state(conversation_id).await {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "state load failed");
                Ok(None)
            }
        }
    }

    /// Drop a conversation's scratch state. Returns whether a snapshot
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id; cache I/O
    /// failures are absorbed as `false`.
    pub async fn clear_state(&self, conversation_id: &str) -> Result<bool> {
        validate_conversation_id(conversation_id)?;
        match self.cache.delete_state(conversation_id).await {
            Ok(existed) => Ok(existed),
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "state delete failed");
                Ok(false)
            }
        }
    }

    /// Summarize a conversation for diagnostics: message count after any
    /// fallback recovery, and whether any history exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConversationId`] for a bad id.
    pub async fn context_summary(&self, conversation_id: &str) -> Result<ConversationSummary> {
        let messages = self.get_messages(conversation_id, None, false).await?;
        Ok(ConversationSummary {
            conversation_id: conversation_id.to_string(),
            message_count: messages.len(),
            has_history: !messages.is_empty(),
        })
    }

    /// Walk the durable tiers in fallback order and return the first
    /// non-empty history found. Every failure here is absorbed: an
    /// unreachable tier just means trying the next one.
    async fn recover_from_durable(&self, conversation_id: &str) -> Vec<Message> {
        for (key, tier) in FALLBACK_ORDER {
            let Some(backend) = self.backend(key).await else {
                continue;
            };
            match backend.load_history(conversation_id).await {
                Ok(messages) if !messages.is_empty() => {
                    info!(
                        conversation_id = %conversation_id,
                        tier,
                        count = messages.len(),
                        "history recovered from durable tier"
                    );
                    return messages;
                }
                Ok(_) => {
                    debug!(conversation_id = %conversation_id, tier, "durable tier has no history");
                }
                Err(e) => {
                    warn!(conversation_id = %conversation_id, tier, error = %e, "durable tier read failed");
                }
            }
        }
        Vec::new()
    }

    /// Resolve a durable adapter if its tier is deployed and comes up.
    async fn backend(&self, key: &str) -> Option<Arc<HistoryAdapter>> {
        if !self.registry.has(key).await {
            return None;
        }
        match self.registry.get(key).await {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!(key, error = %e, "durable tier unavailable");
                None
            }
        }
    }
}

fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    if conversation_id.is_empty() {
        return Err(Error::InvalidConversationId(
            "conversation id is empty".to_string(),
        ));
    }
    if conversation_id.len() > MAX_CONVERSATION_ID_BYTES {
        return Err(Error::InvalidConversationId(format!(
            "conversation id exceeds {} bytes",
            MAX_CONVERSATION_ID_BYTES
        )));
    }
    Ok(())
}

/// Keep only the most recent `limit` messages.
fn tail(mut messages: Vec<Message>, limit: Option<usize>) -> Vec<Message> {
    if let Some(limit) = limit {
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
    }
    messages
}
