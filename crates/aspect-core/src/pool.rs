//! Reuse pool for [`Context`] values.
//!
//! Contexts are moved into the pool, so a context can never be reused while
//! something still borrows it. Every context is fully reset on release and
//! again on acquire.

use parking_lot::Mutex;

use crate::cancel::CancelSignal;
use crate::context::Context;
use crate::settings::PoolSettings;
use crate::types::{FunctionKey, Value};

/// Thread-safe pool of idle contexts.
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    settings: PoolSettings,
}

impl ContextPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            settings,
        }
    }

    /// Take a context for a new call.
    pub fn acquire(&self, function: FunctionKey, args: Vec<Value>, signal: CancelSignal) -> Context {
        let pooled = if self.settings.enabled {
            self.idle.lock().pop()
        } else {
            None
        };

        match pooled {
            Some(mut ctx) => {
                ctx.reset();
                ctx.prepare(function, args, signal);
                ctx
            }
            None => Context::with_signal(function, args, signal),
        }
    }

    /// Return a finished context.
    ///
    /// Dropped instead when pooling is disabled or the pool is full.
    pub fn release(&self, mut ctx: Context) {
        if !self.settings.enabled {
            return;
        }
        ctx.shrink(
            self.settings.max_result_capacity,
            self.settings.max_metadata_entries,
        );
        ctx.reset();

        let mut idle = self.idle.lock();
        if idle.len() < self.settings.max_idle {
            idle.push(ctx);
        }
    }

    /// Number of idle contexts.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Settings the pool was built with.
    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(PoolSettings::default())
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("enabled", &self.settings.enabled)
            .field("idle_count", &self.idle_count())
            .finish()
    }
}
