//! mneme: tiered session memory for conversational agents.
//!
//! Conversation history and scratch state live in a fast cache tier and are
//! recovered from optional durable stores when the cache forgets:
//!
//! ```text
//!   get_messages(id)
//!        |
//!        v
//!   +-----------+  miss   +----------------+  miss   +------------------+
//!   |   cache   | ------> | document store | ------> | relational store |
//!   | (Redis /  |         |   (MongoDB)    |         |     (SQLite)     |
//!   |  memory)  | <------ +----------------+ <------ +------------------+
//!   +-----------+       write-back on recovery
//! ```
//!
//! Durable tiers are registered with a [`ServiceRegistry`] and constructed
//! lazily; a tier that is not deployed, or not reachable, degrades the read
//! instead of failing it. The only errors callers see are their own: bad
//! conversation ids and registry misconfiguration.
//!
//! ```no_run
//! use mneme::{MemoryConfig, Message, SessionMemoryStore};
//!
//! # async fn example() -> mneme::Result<()> {
//! let config = MemoryConfig::default();
//! let store = SessionMemoryStore::from_config(&config).await?;
//!
//! store.add_message("conv-1", Message::user("hello")).await?;
//! let history = store.get_messages("conv-1", Some(50), false).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod memory;
pub mod registry;

pub use config::{DocumentStoreConfig, MemoryConfig, RelationalStoreConfig};
pub use error::{Error, Result};
pub use memory::{
    generate_conversation_id, ConversationSummary, Message, MessageRole, SessionCache,
    SessionMemoryStore, StateSnapshot,
};
pub use registry::{Service, ServiceRegistry, StartupReport};
