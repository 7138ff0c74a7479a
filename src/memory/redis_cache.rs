//! Redis-backed cache tier.
//!
//! Payloads are stored as single JSON documents under prefixed keys
//! (`<prefix>history:<id>` and `<prefix>state:<id>`), written with `SETEX`
//! so every write is one atomic replacement that also refreshes the TTL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::cache::CacheStore;
use super::message::{Message, StateSnapshot};
use crate::error::{Error, Result};

/// Redis cache backend.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    history_prefix: String,
    state_prefix: String,
    ttl_seconds: u64,
}

impl RedisCache {
    /// Create a Redis cache. No connection is opened yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL is invalid.
    pub fn new(redis_url: &str, key_prefix: &str, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Configuration(format!("invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            history_prefix: format!("{}history:", key_prefix),
            state_prefix: format!("{}state:", key_prefix),
            ttl_seconds,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("Redis connection failed: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection().await?;

        let data: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("Redis GET failed: {}", e)))?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(value)?;

        redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_seconds)
            .arg(&json)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("Redis SETEX failed: {}", e)))?;

        debug!(key = %key, ttl = %self.ttl_seconds, "cache entry written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;

        let deleted: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendUnavailable(format!("Redis DEL failed: {}", e)))?;

        Ok(deleted > 0)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn load_history(&self, conversation_id: &str) -> Result<Option<Vec<Message>>> {
        let key = format!("{}{}", self.history_prefix, conversation_id);
        self.get_json(&key).await
    }

    async fn store_history(&self, conversation_id: &str, messages: &[Message]) -> Result<()> {
        let key = format!("{}{}", self.history_prefix, conversation_id);
        self.set_json(&key, &messages).await
    }

    async fn delete_history(&self, conversation_id: &str) -> Result<bool> {
        let key = format!("{}{}", self.history_prefix, conversation_id);
        self.delete(&key).await
    }

    async fn load_state(&self, conversation_id: &str) -> Result<Option<StateSnapshot>> {
        let key = format!("{}{}", self.state_prefix, conversation_id);
        self.get_json(&key).await
    }

    async fn store_state(&self, conversation_id: &str, state: &StateSnapshot) -> Result<()> {
        let key = format!("{}{}", self.state_prefix, conversation_id);
        self.set_json(&key, state).await
    }

    async fn delete_state(&self, conversation_id: &str) -> Result<bool> {
        let key = format!("{}{}", self.state_prefix, conversation_id);
        self.delete(&key).await
    }

    async fn ping(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

// Redis tests require a running Redis instance.
// Run with: cargo test --features redis-tests
#[cfg(all(test, feature = "redis-tests"))]
mod tests {
    use super::*;

    fn test_cache() -> RedisCache {
        RedisCache::new("redis://127.0.0.1:6379", "mneme:test:", 60).unwrap()
    }

    #[tokio::test]
    async fn history_round_trip() {
        let cache = test_cache();
        let id = crate::memory::generate_conversation_id();

        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        cache.store_history(&id, &messages).await.unwrap();
        assert_eq!(cache.load_history(&id).await.unwrap(), Some(messages));

        assert!(cache.delete_history(&id).await.unwrap());
        assert_eq!(cache.load_history(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ping_reports_reachability() {
        assert!(test_cache().ping().await);
        let unreachable = RedisCache::new("redis://127.0.0.1:1", "mneme:test:", 60).unwrap();
        assert!(!unreachable.ping().await);
    }
}
