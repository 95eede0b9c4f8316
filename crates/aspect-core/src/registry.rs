//! Function registry.
//!
//! Maps each [`FunctionKey`] to its [`AdviceChain`]. The registry is the
//! source of truth for which functions are intercepted and which advice is
//! attached to them. It also owns the [`ContextPool`] the engine draws
//! per-call contexts from.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::advice::{Advice, AdviceChain};
use crate::context::Context;
use crate::errors::{RegistryError, Result};
use crate::pool::ContextPool;
use crate::settings::EngineSettings;
use crate::types::FunctionKey;

/// Process-wide registry, created on first access.
static DEFAULT_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

/// Get the shared default registry.
///
/// Behaves exactly like a registry built with [`Registry::new`]. Code that
/// needs isolation (tests in particular) should build its own instead.
pub fn default_registry() -> Arc<Registry> {
    Arc::clone(DEFAULT_REGISTRY.get_or_init(|| Arc::new(Registry::new())))
}

/// Registry of intercepted functions and their advice.
///
/// Lookups take a shared lock and run concurrently; registration, advice
/// addition and removal take the exclusive lock.
pub struct Registry {
    entries: RwLock<HashMap<FunctionKey, Arc<AdviceChain>>>,
    pool: ContextPool,
}

impl Registry {
    /// Create an empty registry with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(&EngineSettings::default())
    }

    /// Create an empty registry with the given settings.
    #[must_use]
    pub fn with_settings(settings: &EngineSettings) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            pool: ContextPool::new(settings.pool.clone()),
        }
    }

    /// Register a function with an empty advice chain.
    pub fn register(&self, key: impl AsRef<str>) -> Result<()> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(RegistryError::InvalidKey);
        }

        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Err(RegistryError::DuplicateKey(FunctionKey::from(key)));
        }
        let _ = entries.insert(FunctionKey::from(key), Arc::new(AdviceChain::new()));
        debug!(function = %key, "registered function");
        Ok(())
    }

    /// Get the chain for `key`, registering it first if needed.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty. An empty key is a programming error here;
    /// use [`register`](Self::register) for a recoverable check.
    pub fn get_or_create(&self, key: impl AsRef<str>) -> Arc<AdviceChain> {
        let key = key.as_ref();
        assert!(!key.is_empty(), "function key cannot be empty");

        if let Some(chain) = self.entries.read().get(key) {
            return Arc::clone(chain);
        }

        let mut entries = self.entries.write();
        let chain = entries.entry(FunctionKey::from(key)).or_insert_with(|| {
            debug!(function = %key, "registered function");
            Arc::new(AdviceChain::new())
        });
        Arc::clone(chain)
    }

    /// Attach advice to a registered function.
    pub fn add_advice(&self, key: impl AsRef<str>, advice: Advice) -> Result<()> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(RegistryError::InvalidKey);
        }

        let entries = self.entries.write();
        let chain = entries
            .get(key)
            .ok_or_else(|| RegistryError::NotRegistered(FunctionKey::from(key)))?;
        debug!(
            function = %key,
            phase = %advice.phase(),
            priority = advice.priority(),
            advice = advice.name(),
            "adding advice"
        );
        chain.add(advice);
        Ok(())
    }

    /// Get the advice chain for a registered function.
    pub fn get_chain(&self, key: impl AsRef<str>) -> Result<Arc<AdviceChain>> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(RegistryError::InvalidKey);
        }
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(FunctionKey::from(key)))
    }

    /// Returns `true` if `key` is registered.
    #[must_use]
    pub fn is_registered(&self, key: impl AsRef<str>) -> bool {
        self.entries.read().contains_key(key.as_ref())
    }

    /// Remove a function and its advice. Does nothing if absent.
    pub fn unregister(&self, key: impl AsRef<str>) {
        let key = key.as_ref();
        if self.entries.write().remove(key).is_some() {
            debug!(function = %key, "unregistered function");
        }
    }

    /// All registered keys, sorted.
    #[must_use]
    pub fn list_keys(&self) -> Vec<FunctionKey> {
        let mut keys: Vec<FunctionKey> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove every registered function.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered functions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Total advice attached to `key`, or 0 if it is not registered.
    #[must_use]
    pub fn advice_count(&self, key: impl AsRef<str>) -> usize {
        self.entries
            .read()
            .get(key.as_ref())
            .map_or(0, |chain| chain.count())
    }

    /// Pool the engine draws contexts from.
    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Hand a finished context back for reuse.
    ///
    /// Call once every needed value has been moved out of it.
    pub fn recycle(&self, ctx: Context) {
        self.pool.release(ctx);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("function_count", &self.count())
            .field("pool", &self.pool)
            .finish()
    }
}
