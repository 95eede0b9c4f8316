//! Fluent advice configuration.
//!
//! ```rust,ignore
//! Aspect::on_registry(Arc::clone(&registry), "checkout")
//!     .before(|ctx| authorize(ctx))
//!     .after_with_priority(100, |ctx| audit(ctx));
//! ```
//!
//! Every method registers the function on first use, so no separate
//! `register` call is needed.

use std::fmt;
use std::sync::Arc;

use aspect_core::{Advice, AdvicePhase, Context, FunctionKey, Registry, default_registry};
use tracing::debug;

/// Builder that attaches advice to one function key.
#[derive(Clone)]
pub struct Aspect {
    registry: Arc<Registry>,
    key: FunctionKey,
}

#[allow(clippy::return_self_not_must_use)]
impl Aspect {
    /// Target `key` in the [default registry](default_registry).
    pub fn on(key: impl Into<FunctionKey>) -> Self {
        Self::on_registry(default_registry(), key)
    }

    /// Target `key` in `registry`.
    pub fn on_registry(registry: Arc<Registry>, key: impl Into<FunctionKey>) -> Self {
        Self {
            registry,
            key: key.into(),
        }
    }

    /// Registry the advice goes into.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Function the advice is attached to.
    #[must_use]
    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    /// Attach prepared advice.
    ///
    /// # Panics
    ///
    /// Panics if the key is empty (see [`Registry::get_or_create`]).
    pub fn advice(self, advice: Advice) -> Self {
        debug!(
            function = %self.key,
            phase = %advice.phase(),
            priority = advice.priority(),
            "adding advice"
        );
        self.registry.get_or_create(&self.key).add(advice);
        self
    }

    /// Attach `Before` advice with priority 0.
    pub fn before<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_with_priority(0, handler)
    }

    /// Attach `Before` advice.
    pub fn before_with_priority<F>(self, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.phase(AdvicePhase::Before, priority, handler)
    }

    /// Attach `Around` advice with priority 0.
    pub fn around<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.around_with_priority(0, handler)
    }

    /// Attach `Around` advice.
    pub fn around_with_priority<F>(self, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.phase(AdvicePhase::Around, priority, handler)
    }

    /// Attach `After` advice with priority 0.
    pub fn after<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_with_priority(0, handler)
    }

    /// Attach `After` advice.
    pub fn after_with_priority<F>(self, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.phase(AdvicePhase::After, priority, handler)
    }

    /// Attach `AfterReturning` advice with priority 0.
    pub fn after_returning<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_returning_with_priority(0, handler)
    }

    /// Attach `AfterReturning` advice.
    pub fn after_returning_with_priority<F>(self, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.phase(AdvicePhase::AfterReturning, priority, handler)
    }

    /// Attach `AfterThrowing` advice with priority 0.
    pub fn after_throwing<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_throwing_with_priority(0, handler)
    }

    /// Attach `AfterThrowing` advice.
    pub fn after_throwing_with_priority<F>(self, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.phase(AdvicePhase::AfterThrowing, priority, handler)
    }

    fn phase<F>(self, phase: AdvicePhase, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.advice(Advice::new(phase, handler).with_priority(priority))
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("key", &self.key)
            .field("advice_count", &self.registry.advice_count(&self.key))
            .finish()
    }
}
