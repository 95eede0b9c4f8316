//! # aspect
//!
//! Explicit function interception: attach advice to ordinary functions by
//! wrapping them, without reflection or code generation.
//!
//! - [`Aspect`] configures advice for a function key.
//! - [`wrap0`]..[`wrap3`] and [`try_wrap0`]..[`try_wrap3`] turn a plain
//!   function into one that runs through that advice.
//!
//! The execution engine itself lives in `aspect-core` and is re-exported
//! here.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aspect::{Aspect, Registry, try_wrap2};
//!
//! let registry = Arc::new(Registry::new());
//! Aspect::on_registry(Arc::clone(&registry), "divide")
//!     .after_throwing(|ctx| {
//!         tracing::error!(panic = ?ctx.panic_message(), "divide panicked");
//!         Ok(())
//!     });
//!
//! let divide = try_wrap2(registry, "divide", |a: i32, b: i32| {
//!     a.checked_div(b).ok_or_else(|| anyhow::anyhow!("division by zero"))
//! });
//! assert_eq!(divide(6, 3)?, 2);
//! ```

#![deny(unsafe_code)]

pub mod fluent;
pub mod wrap;

pub use fluent::Aspect;
pub use wrap::{
    WrapError, try_wrap0, try_wrap1, try_wrap2, try_wrap3, wrap0, wrap1, wrap2, wrap3,
};

pub use aspect_core::logging;
pub use aspect_core::{
    Advice, AdviceAbort, AdviceChain, AdviceHandler, AdvicePhase, CancelError, CancelSignal, Context,
    ContextPool, EngineSettings, FunctionKey, Metadata, PhaseError, PoolSettings, Registry,
    RegistryError, ResultSlot, SettingsError, Value, default_registry, invoke_with_advice,
    invoke_with_advice_cancellable, value,
};
