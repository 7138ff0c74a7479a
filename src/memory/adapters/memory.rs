//! In-process durable-tier stand-in.
//!
//! Holds pre-seeded conversations in a plain map and counts `load_history`
//! calls, which makes tier-priority and short-circuit behavior observable in
//! tests. Also usable as a fixture backend when running without databases.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::HistoryBackend;
use crate::error::{Error, Result};
use crate::memory::message::Message;
use crate::registry::Service;

/// In-process history backend for development and tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: HashMap<String, Vec<Message>>,
    loads: AtomicUsize,
    unavailable: bool,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that fails every read, simulating a backend outage.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Seed a conversation (builder style).
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>, messages: Vec<Message>) -> Self {
        self.conversations.insert(conversation_id.into(), messages);
        self
    }

    /// Number of `load_history` calls served so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Clone for MemoryHistoryStore {
    fn clone(&self) -> Self {
        Self {
            conversations: self.conversations.clone(),
            loads: AtomicUsize::new(self.loads.load(Ordering::SeqCst)),
            unavailable: self.unavailable,
        }
    }
}

#[async_trait]
impl Service for MemoryHistoryStore {}

#[async_trait]
impl HistoryBackend for MemoryHistoryStore {
    async fn load_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::BackendUnavailable(
                "simulated backend outage".to_string(),
            ));
        }
        Ok(self
            .conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_history_is_returned_and_counted() {
        let store = MemoryHistoryStore::new()
            .with_conversation("c1", vec![Message::user("hi"), Message::assistant("hello")]);

        assert_eq!(store.load_count(), 0);
        let history = store.load_history("c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(store.load_history("absent").await.unwrap().is_empty());
        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryHistoryStore::unavailable();
        assert!(matches!(
            store.load_history("c1").await,
            Err(Error::BackendUnavailable(_))
        ));
        assert_eq!(store.load_count(), 1);
    }
}
