//! # aspect-core
//!
//! Advice execution engine for explicitly wrapped functions.
//!
//! Callers register a [`FunctionKey`] in a [`Registry`], attach [`Advice`]
//! to it, and route calls through [`invoke_with_advice`]. The engine runs the
//! advice around the target thunk in five phases:
//!
//! 1. [`Before`](AdvicePhase::Before): gatekeeper; an error aborts the call.
//! 2. [`Around`](AdvicePhase::Around): gatekeeper; may set the skip flag and
//!    supply the result itself.
//! 3. The target thunk.
//! 4. [`AfterReturning`](AdvicePhase::AfterReturning): observer, only when
//!    the call produced no error and no panic.
//! 5. [`After`](AdvicePhase::After): observer, exactly once per call.
//!
//! A panic from the target (or a gatekeeper veto, raised as an
//! [`AdviceAbort`] payload) runs [`AfterThrowing`](AdvicePhase::AfterThrowing)
//! and then `After` before the unwind is resumed for the caller.
//!
//! ## Fail-Open Observers
//!
//! Observer phase errors never change the call's outcome. They are logged
//! at `warn` and discarded.
//!
//! ## Example
//!
//! ```rust
//! use aspect_core::{Advice, AdvicePhase, Registry, invoke_with_advice, value};
//!
//! let registry = Registry::new();
//! registry.register("greet").unwrap();
//! registry
//!     .add_advice("greet", Advice::before(|ctx| {
//!         ctx.metadata().insert("seen", true);
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! let mut ctx = invoke_with_advice(&registry, "greet", vec![value("ada")], |ctx| {
//!     let name = ctx.arg::<&str>(0).copied().unwrap_or_default();
//!     ctx.set_result(0, format!("hello {name}"));
//! });
//! assert_eq!(ctx.take_result::<String>(0).as_deref(), Some("hello ada"));
//! ```

#![deny(unsafe_code)]

pub mod advice;
pub mod cancel;
pub mod context;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod settings;
pub mod types;

pub use advice::{Advice, AdviceChain, AdviceHandler};
pub use cancel::CancelSignal;
pub use context::{Context, Metadata};
pub use engine::{invoke_with_advice, invoke_with_advice_cancellable};
pub use errors::{AdviceAbort, CancelError, PhaseError, RegistryError, Result, SettingsError};
pub use pool::ContextPool;
pub use registry::{Registry, default_registry};
pub use settings::{EngineSettings, PoolSettings};
pub use types::{AdvicePhase, FunctionKey, ResultSlot, Value, value};
