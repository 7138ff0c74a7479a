//! Volatile cache tier for message history and pipeline state.
//!
//! Two backends implement [`CacheStore`]: [`RedisCache`](super::RedisCache)
//! for shared deployments and [`MemoryCache`] as the transparent in-process
//! fallback when Redis is not configured or unreachable at startup. History
//! and state live in separate key namespaces but share one TTL; every write
//! replaces the whole payload and refreshes the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::message::{Message, StateSnapshot};
use super::redis_cache::RedisCache;
use crate::config::MemoryConfig;
use crate::error::Result;

/// Volatile tier operations. `None` results mean "no entry", whether the
/// entry never existed or its TTL expired.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the cached message list for a conversation.
    async fn load_history(&self, conversation_id: &str) -> Result<Option<Vec<Message>>>;

    /// Replace the cached message list, refreshing the TTL.
    async fn store_history(&self, conversation_id: &str, messages: &[Message]) -> Result<()>;

    /// Delete the cached message list. Returns true if an entry existed.
    async fn delete_history(&self, conversation_id: &str) -> Result<bool>;

    /// Load the cached state snapshot for a conversation.
    async fn load_state(&self, conversation_id: &str) -> Result<Option<StateSnapshot>>;

    /// Replace the cached state snapshot, refreshing the TTL.
    async fn store_state(&self, conversation_id: &str, state: &StateSnapshot) -> Result<()>;

    /// Delete the cached state snapshot. Returns true if an entry existed.
    async fn delete_state(&self, conversation_id: &str) -> Result<bool>;

    /// Probe backend reachability.
    async fn ping(&self) -> bool;
}

struct Entry<T> {
    payload: T,
    expires_at: Instant,
}

type EntryMap<T> = Arc<RwLock<HashMap<String, Entry<T>>>>;

async fn load_entry<T: Clone>(map: &EntryMap<T>, key: &str) -> Option<T> {
    let mut entries = map.write().await;
    match entries.get(key) {
        Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
        Some(_) => {
            // Expired entries are treated as absent and pruned on read.
            entries.remove(key);
            None
        }
        None => None,
    }
}

async fn store_entry<T>(map: &EntryMap<T>, key: &str, payload: T, ttl: Duration) {
    let mut entries = map.write().await;
    entries.insert(
        key.to_string(),
        Entry {
            payload,
            expires_at: Instant::now() + ttl,
        },
    );
}

async fn delete_entry<T>(map: &EntryMap<T>, key: &str) -> bool {
    map.write().await.remove(key).is_some()
}

/// In-process cache used when Redis is not available.
///
/// Entries are TTL-bound like their Redis counterparts; clones share the
/// underlying maps.
#[derive(Clone)]
pub struct MemoryCache {
    history: EntryMap<Vec<Message>>,
    state: EntryMap<StateSnapshot>,
    ttl: Duration,
}

impl MemoryCache {
    /// Create an empty cache with the given entry TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            history: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn load_history(&self, conversation_id: &str) -> Result<Option<Vec<Message>>> {
        Ok(load_entry(&self.history, conversation_id).await)
    }

    async fn store_history(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        store_entry(&self.history, conversation_id, messages.to_vec(), self.ttl).await;
        Ok(())
    }

    async fn delete_history(&self, conversation_id: &str) -> Result<bool> {
        Ok(delete_entry(&self.history, conversation_id).await)
    }

    async fn load_state(&self, conversation_id: &str) -> Result<Option<StateSnapshot>> {
        Ok(load_entry(&self.state, conversation_id).await)
    }

    async fn store_state(&self, conversation_id: &str, state: &StateSnapshot) -> Result<()> {
        store_entry(&self.state, conversation_id, state.clone(), self.ttl).await;
        Ok(())
    }

    async fn delete_state(&self, conversation_id: &str) -> Result<bool> {
        Ok(delete_entry(&self.state, conversation_id).await)
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// The cache tier as selected at startup.
#[derive(Clone)]
pub enum SessionCache {
    /// Shared Redis cache
    Redis(RedisCache),
    /// In-process fallback
    Memory(MemoryCache),
}

impl SessionCache {
    /// Select the cache backend from configuration.
    ///
    /// If a Redis URL is configured, the connection is probed once; an
    /// unreachable Redis degrades to the in-process cache with a warning
    /// rather than failing startup.
    pub async fn from_config(config: &MemoryConfig) -> Self {
        if let Some(url) = &config.redis_url {
            match RedisCache::new(url, &config.key_prefix, config.ttl_seconds) {
                Ok(cache) => {
                    if cache.ping().await {
                        info!(ttl_seconds = config.ttl_seconds, "session cache using Redis");
                        return Self::Redis(cache);
                    }
                    warn!(url = %url, "Redis unreachable, falling back to in-process cache");
                }
                Err(e) => {
                    warn!(error = %e, "invalid Redis configuration, falling back to in-process cache");
                }
            }
        }
        info!(
            ttl_seconds = config.ttl_seconds,
            "session cache using in-process store"
        );
        Self::Memory(MemoryCache::new(Duration::from_secs(config.ttl_seconds)))
    }
}

#[async_trait]
impl CacheStore for SessionCache {
    async fn load_history(&self, conversation_id: &str) -> Result<Option<Vec<Message>>> {
        match self {
            Self::Redis(cache) => cache.load_history(conversation_id).await,
            Self::Memory(cache) => cache.load_history(conversation_id).await,
        }
    }

    async fn store_history(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        match self {
            Self::Redis(cache) => cache.store_history(conversation_id, messages).await,
            Self::Memory(cache) => cache.store_history(conversation_id, messages).await,
        }
    }

    async fn delete_history(&self, conversation_id: &str) -> Result<bool> {
        match self {
            Self::Redis(cache) => cache.delete_history(conversation_id).await,
            Self::Memory(cache) => cache.delete_history(conversation_id).await,
        }
    }

    async fn load_state(&self, conversation_id: &str) -> Result<Option<StateSnapshot>> {
        match self {
            Self::Redis(cache) => cache.load_state(conversation_id).await,
            Self::Memory(cache) => cache.load_state(conversation_id).await,
        }
    }

    async fn store_state(&self, conversation_id: &str, state: &StateSnapshot) -> Result<()> {
        match self {
            Self::Redis(cache) => cache.store_state(conversation_id, state).await,
            Self::Memory(cache) => cache.store_state(conversation_id, state).await,
        }
    }

    async fn delete_state(&self, conversation_id: &str) -> Result<bool> {
        match self {
            Self::Redis(cache) => cache.delete_state(conversation_id).await,
            Self::Memory(cache) => cache.delete_state(conversation_id).await,
        }
    }

    async fn ping(&self) -> bool {
        match self {
            Self::Redis(cache) => cache.ping().await,
            Self::Memory(cache) => cache.ping().await,
        }
    }
}
