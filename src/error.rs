//! Error types for the session memory subsystem.
//!
//! Cache and durable-tier I/O failures are absorbed inside
//! [`SessionMemoryStore`](crate::memory::SessionMemoryStore) and degrade to
//! empty results; only registry misuse and malformed caller input propagate.

/// Errors that can occur in session memory operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No service is registered under the requested key
    #[error("unknown service: '{0}'")]
    UnknownService(String),

    /// A factory is already registered under the key
    #[error("service '{0}' is already registered")]
    DuplicateService(String),

    /// A service instance failed its startup hook; the key stays unresolved
    /// until `get` is retried
    #[error("service '{key}' failed to initialize: {message}")]
    ServiceInit {
        /// Registry key of the failing service
        key: String,
        /// Rendered initialization error
        message: String,
    },

    /// A cache or durable backend could not be reached
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Caller-supplied conversation id is malformed
    #[error("invalid conversation id: {0}")]
    InvalidConversationId(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General internal error
    #[error("{0}")]
    Internal(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
