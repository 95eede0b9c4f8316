//! Typed wrappers over [`invoke_with_advice`].
//!
//! Each wrapper takes a registry, a function key and a plain Rust function,
//! and returns a closure with the same shape that routes every call through
//! the advice registered for the key. Arguments are cloned into the context
//! so advice can inspect them; the target's return value travels through
//! result slot 0.
//!
//! Wrappers exist for zero to three arguments. Infallible wrappers (`wrapN`) return the result directly. Fallible
//! wrappers (`try_wrapN`) wrap functions returning `Result<R, E>` and return
//! `anyhow::Result<R>`, so advice can rewrite or replace the error.

use std::panic;
use std::sync::Arc;

use aspect_core::{Context, FunctionKey, Registry, invoke_with_advice, value};
use thiserror::Error;

/// Failure to recover a typed result from a finished call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WrapError {
    /// Slot 0 was empty or held a value of another type.
    ///
    /// Happens when `Around` advice skips the target without supplying a
    /// result of the wrapped return type, or when advice overwrites the
    /// result with another type.
    #[error("call to '{function}' produced no result of the expected type")]
    MissingResult {
        /// Function that was called.
        function: FunctionKey,
    },
}

/// Wrap a function with no arguments.
///
/// # Panics
///
/// The returned closure panics with a [`WrapError`] payload if no result
/// of type `R` is available after the call. It also resumes any unwind
/// raised by the target or by a gatekeeper veto.
pub fn wrap0<R, F>(registry: Arc<Registry>, key: impl Into<FunctionKey>, f: F) -> impl Fn() -> R + Send + Sync
where
    R: Send + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    let key = key.into();
    move || {
        let ctx = invoke_with_advice(&registry, &key, Vec::new(), |ctx| ctx.set_result(0, f()));
        expect_result(&registry, ctx)
    }
}

/// Wrap a function with one argument.
///
/// # Panics
///
/// See [`wrap0`].
pub fn wrap1<A, R, F>(registry: Arc<Registry>, key: impl Into<FunctionKey>, f: F) -> impl Fn(A) -> R + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A| {
        let args = vec![value(a.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| ctx.set_result(0, f(a)));
        expect_result(&registry, ctx)
    }
}

/// Wrap a function with two arguments.
///
/// # Panics
///
/// See [`wrap0`].
pub fn wrap2<A, B, R, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn(A, B) -> R + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(A, B) -> R + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A, b: B| {
        let args = vec![value(a.clone()), value(b.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| ctx.set_result(0, f(a, b)));
        expect_result(&registry, ctx)
    }
}

/// Wrap a function with three arguments.
///
/// # Panics
///
/// See [`wrap0`].
pub fn wrap3<A, B, C, R, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn(A, B, C) -> R + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(A, B, C) -> R + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A, b: B, c: C| {
        let args = vec![value(a.clone()), value(b.clone()), value(c.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| ctx.set_result(0, f(a, b, c)));
        expect_result(&registry, ctx)
    }
}

/// Wrap a fallible function with no arguments.
///
/// An error left in the context (by the target or by advice) wins over
/// any result. Panics and vetoes are resumed as with [`wrap0`].
pub fn try_wrap0<R, E, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn() -> anyhow::Result<R> + Send + Sync
where
    R: Send + 'static,
    E: Into<anyhow::Error>,
    F: Fn() -> Result<R, E> + Send + Sync + 'static,
{
    let key = key.into();
    move || {
        let ctx = invoke_with_advice(&registry, &key, Vec::new(), |ctx| store(ctx, f()));
        resolve(&registry, ctx)
    }
}

/// Wrap a fallible function with one argument.
///
/// See [`try_wrap0`].
pub fn try_wrap1<A, R, E, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn(A) -> anyhow::Result<R> + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Into<anyhow::Error>,
    F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A| {
        let args = vec![value(a.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| store(ctx, f(a)));
        resolve(&registry, ctx)
    }
}

/// Wrap a fallible function with two arguments.
///
/// See [`try_wrap0`].
pub fn try_wrap2<A, B, R, E, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn(A, B) -> anyhow::Result<R> + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Into<anyhow::Error>,
    F: Fn(A, B) -> Result<R, E> + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A, b: B| {
        let args = vec![value(a.clone()), value(b.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| store(ctx, f(a, b)));
        resolve(&registry, ctx)
    }
}

/// Wrap a fallible function with three arguments.
///
/// See [`try_wrap0`].
pub fn try_wrap3<A, B, C, R, E, F>(
    registry: Arc<Registry>,
    key: impl Into<FunctionKey>,
    f: F,
) -> impl Fn(A, B, C) -> anyhow::Result<R> + Send + Sync
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Into<anyhow::Error>,
    F: Fn(A, B, C) -> Result<R, E> + Send + Sync + 'static,
{
    let key = key.into();
    move |a: A, b: B, c: C| {
        let args = vec![value(a.clone()), value(b.clone()), value(c.clone())];
        let ctx = invoke_with_advice(&registry, &key, args, |ctx| store(ctx, f(a, b, c)));
        resolve(&registry, ctx)
    }
}

fn store<R, E>(ctx: &mut Context, outcome: Result<R, E>)
where
    R: Send + 'static,
    E: Into<anyhow::Error>,
{
    match outcome {
        Ok(result) => ctx.set_result(0, result),
        Err(err) => ctx.set_error(err),
    }
}

/// Error first, then slot 0. The context goes back to the pool either way.
fn resolve<R: Send + 'static>(registry: &Registry, mut ctx: Context) -> anyhow::Result<R> {
    let outcome: anyhow::Result<R> = match ctx.take_error() {
        Some(err) => Err(err),
        None => ctx.take_result::<R>(0).ok_or_else(|| {
            WrapError::MissingResult {
                function: ctx.function().clone(),
            }
            .into()
        }),
    };
    registry.recycle(ctx);
    outcome
}

fn expect_result<R: Send + 'static>(registry: &Registry, mut ctx: Context) -> R {
    let result = ctx.take_result::<R>(0);
    let function = ctx.function().clone();
    registry.recycle(ctx);
    match result {
        Some(result) => result,
        None => panic::panic_any(WrapError::MissingResult { function }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
