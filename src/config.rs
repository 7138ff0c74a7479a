//! Configuration for the tiered session memory subsystem.
//!
//! A single TTL covers both the history and state cache namespaces. Each
//! durable tier carries its own `enabled` flag, read once at startup: a
//! disabled tier is simply never registered with the service registry.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default cache TTL: 7 days, for both message history and state snapshots.
const DEFAULT_TTL_SECONDS: u64 = 7 * 24 * 3600;

/// Top-level memory subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Cache entry TTL in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Redis connection URL. `None` (or an unreachable Redis) selects the
    /// in-process cache instead.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix for every cache key, isolating this subsystem's keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Document-oriented durable tier (MongoDB).
    #[serde(default)]
    pub document_store: DocumentStoreConfig,

    /// Relational durable tier (SQLite).
    #[serde(default)]
    pub relational_store: RelationalStoreConfig,
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_key_prefix() -> String {
    "mneme:".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            document_store: DocumentStoreConfig::default(),
            relational_store: RelationalStoreConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| Error::Configuration(format!("invalid config: {}", e)))
    }
}

/// Document-oriented durable tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Whether this tier is deployed.
    #[serde(default)]
    pub enabled: bool,

    /// MongoDB connection string.
    #[serde(default = "default_document_uri")]
    pub uri: String,

    /// Database name.
    #[serde(default = "default_document_database")]
    pub database: String,

    /// Collection holding one document per conversation.
    #[serde(default = "default_document_collection")]
    pub collection: String,
}

fn default_document_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_document_database() -> String {
    "mneme".to_string()
}

fn default_document_collection() -> String {
    "conversation_history".to_string()
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: default_document_uri(),
            database: default_document_database(),
            collection: default_document_collection(),
        }
    }
}

/// Relational durable tier settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationalStoreConfig {
    /// Whether this tier is deployed.
    #[serde(default)]
    pub enabled: bool,

    /// SQLite database path; `None` means `~/.mneme/history.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RelationalStoreConfig {
    /// Resolve the database path, falling back to the default location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no path is configured and the
    /// home directory cannot be determined.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().ok_or_else(|| {
            Error::Configuration("could not determine home directory".to_string())
        })?;
        Ok(home.join(".mneme").join("history.db"))
    }
}
