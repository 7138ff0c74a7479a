//! Lazily-instantiating service registry with ordered lifecycle management.
//!
//! [`ServiceRegistry`] holds named factories and constructs each service at
//! most once, on first [`get`](ServiceRegistry::get). Construction order
//! determines shutdown order (reverse), and that is the only ordering
//! guarantee: services that depend on other services are wired explicitly by
//! capturing handles in their factory closures, never through ambient
//! container lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Lifecycle hooks for registry-managed services.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Called exactly once, after the factory constructs the instance and
    /// before it is handed to any caller. A failure leaves the key
    /// unresolved; a later `get` runs the factory again.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Called during [`ServiceRegistry::shutdown_all`], in reverse
    /// construction order.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

type Factory<S> = Box<dyn Fn() -> S + Send + Sync>;

struct Slot<S> {
    factory: Factory<S>,
    instance: Option<Arc<S>>,
    // Serializes construction per key, so the map lock can be released
    // while `initialize` runs.
    init_lock: Arc<Mutex<()>>,
}

struct Inner<S> {
    slots: HashMap<String, Slot<S>>,
    registration_order: Vec<String>,
    construction_order: Vec<String>,
}

/// Singleton-per-key registry of named services.
///
/// Construction is serialized per key, so concurrent `get` calls for the
/// same key can never observe a partially-initialized instance or build a
/// second one. The map lock is never held across a service's `initialize`,
/// so one key's slow startup does not block lookups for other keys.
pub struct ServiceRegistry<S> {
    inner: Mutex<Inner<S>>,
}

impl<S: Service> Default for ServiceRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Service> ServiceRegistry<S> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                registration_order: Vec::new(),
                construction_order: Vec::new(),
            }),
        }
    }

    /// Register a factory under `key`. No instance is created yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateService`] if `key` is already registered.
    pub async fn register<F>(&self, key: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        let key = key.into();
        let mut inner = self.inner.lock().await;
        if inner.slots.contains_key(&key) {
            return Err(Error::DuplicateService(key));
        }
        debug!(key = %key, "service registered");
        inner.registration_order.push(key.clone());
        inner.slots.insert(
            key,
            Slot {
                factory: Box::new(factory),
                instance: None,
                init_lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(())
    }

    /// True if `key` is registered, regardless of instantiation state.
    pub async fn has(&self, key: &str) -> bool {
        self.inner.lock().await.slots.contains_key(key)
    }

    /// Return the singleton for `key`, constructing and initializing it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownService`] if `key` was never registered, or
    /// [`Error::ServiceInit`] if the instance fails its startup hook. A
    /// failed instance is not cached.
    pub async fn get(&self, key: &str) -> Result<Arc<S>> {
        let init_lock = {
            let inner = self.inner.lock().await;
            let slot = inner
                .slots
                .get(key)
                .ok_or_else(|| Error::UnknownService(key.to_string()))?;
            if let Some(instance) = &slot.instance {
                return Ok(Arc::clone(instance));
            }
            Arc::clone(&slot.init_lock)
        };

        // One initializer per key. Losers of the race re-check the map below
        // and find the winner's instance.
        let _guard = init_lock.lock().await;

        let instance = {
            let inner = self.inner.lock().await;
            let slot = inner
                .slots
                .get(key)
                .ok_or_else(|| Error::UnknownService(key.to_string()))?;
            if let Some(instance) = &slot.instance {
                return Ok(Arc::clone(instance));
            }
            Arc::new((slot.factory)())
        };

        // The map lock is not held here: a slow connect stalls only callers
        // of this key.
        if let Err(e) = instance.initialize().await {
            warn!(key = %key, error = %e, "service failed to initialize");
            return Err(Error::ServiceInit {
                key: key.to_string(),
                message: e.to_string(),
            });
        }

        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.slots.get_mut(key) {
            slot.instance = Some(Arc::clone(&instance));
        }
        inner.construction_order.push(key.to_string());
        debug!(key = %key, "service constructed and initialized");
        Ok(instance)
    }

    /// Eagerly resolve every registered key, in registration order.
    ///
    /// A failure on one key is recorded in the report and does not prevent
    /// subsequent keys from initializing.
    pub async fn initialize_all(&self) -> StartupReport {
        let keys: Vec<String> = self.inner.lock().await.registration_order.clone();

        let mut report = StartupReport::default();
        for key in keys {
            match self.get(&key).await {
                Ok(_) => {
                    info!(key = %key, "service initialized");
                    report.succeeded.push(key);
                }
                Err(e) => {
                    error!(key = %key, error = %e, "service failed to start");
                    report.failed.push((key, e.to_string()));
                }
            }
        }
        report
    }

    /// Shut down every instantiated service, in reverse construction order.
    /// Failures are logged and do not abort remaining shutdowns.
    pub async fn shutdown_all(&self) {
        let instances: Vec<(String, Arc<S>)> = {
            let mut inner = self.inner.lock().await;
            let order: Vec<String> = inner.construction_order.drain(..).rev().collect();
            order
                .into_iter()
                .filter_map(|key| {
                    let instance = inner
                        .slots
                        .get_mut(&key)
                        .and_then(|slot| slot.instance.take());
                    instance.map(|instance| (key, instance))
                })
                .collect()
        };

        for (key, instance) in instances {
            match instance.shutdown().await {
                Ok(()) => debug!(key = %key, "service shut down"),
                Err(e) => error!(key = %key, error = %e, "service shutdown failed"),
            }
        }
    }

    /// Per-key `(key, instantiated)` listing, in registration order.
    pub async fn status(&self) -> Vec<(String, bool)> {
        let inner = self.inner.lock().await;
        inner
            .registration_order
            .iter()
            .map(|key| {
                let instantiated = inner
                    .slots
                    .get(key)
                    .is_some_and(|slot| slot.instance.is_some());
                (key.clone(), instantiated)
            })
            .collect()
    }
}

/// Per-key outcome of [`ServiceRegistry::initialize_all`], kept for startup
/// diagnostics.
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// Keys that resolved and initialized.
    pub succeeded: Vec<String>,
    /// Keys that failed, with the rendered error.
    pub failed: Vec<(String, String)>,
}

impl StartupReport {
    /// True if every registered service came up.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}
