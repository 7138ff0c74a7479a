//! Tiered session memory: cache-first history and state with durable
//! fallback.
//!
//! The [`SessionMemoryStore`] orchestrator fronts a [`SessionCache`] (Redis
//! or in-process) and an ordered set of read-only durable adapters. Reads hit
//! the cache; misses walk the durable tiers and write the recovered history
//! back so the conversation stays hot for its remaining turns.

pub mod adapters;
mod cache;
mod message;
mod redis_cache;
mod store;

pub use cache::{CacheStore, MemoryCache, SessionCache};
pub use message::{
    generate_conversation_id, ConversationSummary, Message, MessageRole, StateSnapshot,
};
pub use redis_cache::RedisCache;
pub use store::SessionMemoryStore;
