//! Five-phase advice execution engine.
//!
//! # Protocol
//!
//! 1. **Lookup.** No chain registered → run the thunk directly and return.
//! 2. **Before.** Failure is a gatekeeper veto.
//! 3. **Around**, only if the chain has Around advice. Failure is a veto.
//!    If the skip flag is set afterwards, the thunk is not run; when the
//!    context holds no error and no panic, `AfterReturning` still runs.
//! 4. **Target.** The thunk writes results and the application error into
//!    the context.
//! 5. **AfterReturning**, only when there is no error and no panic.
//! 6. **After**, exactly once, last, on every path.
//!
//! # Unwinding
//!
//! A veto becomes an [`AdviceAbort`] payload and a target panic keeps its own
//! payload. Both are caught at a single point, stored in the context, and
//! followed by `AfterThrowing`, then `After`, then the unwind is resumed with
//! the original payload. The caller observes the same panic it would have
//! seen without interception.
//!
//! # Observers
//!
//! `After`, `AfterReturning` and `AfterThrowing` cannot change the outcome:
//! their errors are logged and discarded, and a panic inside one of their
//! handlers is caught, logged and discarded as well.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, trace, warn};

use crate::advice::AdviceChain;
use crate::cancel::CancelSignal;
use crate::context::{Context, payload_message};
use crate::errors::AdviceAbort;
use crate::registry::Registry;
use crate::types::{AdvicePhase, FunctionKey, Value};

/// Invoke a target through the advice registered for `key`.
///
/// `thunk` calls the real function and stores its result (and error, if
/// any) in the context. The populated context is returned; hand it back
/// with [`Registry::recycle`] once the result has been moved out.
///
/// # Panics
///
/// Resumes the unwind if the thunk panics, or if `Before`/`Around` advice
/// vetoes the call (payload: [`AdviceAbort`]). `AfterThrowing` and `After`
/// have already run by then.
pub fn invoke_with_advice<F>(registry: &Registry, key: impl AsRef<str>, args: Vec<Value>, thunk: F) -> Context
where
    F: FnOnce(&mut Context),
{
    invoke_with_advice_cancellable(registry, key, CancelSignal::never(), args, thunk)
}

/// [`invoke_with_advice`] with an external cancellation signal.
///
/// The signal is installed as the context's signal and polled before every
/// advice handler. A tripped signal during a gatekeeper phase vetoes the
/// call; during an observer phase it stops that phase only.
pub fn invoke_with_advice_cancellable<F>(
    registry: &Registry,
    key: impl AsRef<str>,
    signal: CancelSignal,
    args: Vec<Value>,
    thunk: F,
) -> Context
where
    F: FnOnce(&mut Context),
{
    let key = key.as_ref();
    let mut ctx = registry.pool().acquire(FunctionKey::from(key), args, signal);

    let Ok(chain) = registry.get_chain(key) else {
        trace!(function = %key, "no advice registered, invoking target directly");
        thunk(&mut ctx);
        return ctx;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_guarded(&chain, &mut ctx, thunk)));
    let payload: Option<Box<dyn Any + Send>> = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(abort)) => {
            debug!(function = %key, phase = %abort.phase, error = %abort.source, "call vetoed by advice");
            Some(Box::new(abort))
        }
        Err(payload) => Some(payload),
    };

    if let Some(payload) = payload {
        ctx.set_panic(payload);
        run_observer(&chain, AdvicePhase::AfterThrowing, &mut ctx);
        run_observer(&chain, AdvicePhase::After, &mut ctx);
        if let Some(payload) = ctx.take_panic() {
            drop(ctx);
            panic::resume_unwind(payload);
        }
        return ctx;
    }

    run_observer(&chain, AdvicePhase::After, &mut ctx);
    ctx
}

/// Steps 2–5. Runs inside the unwind guard.
fn run_guarded<F>(chain: &AdviceChain, ctx: &mut Context, thunk: F) -> Result<(), AdviceAbort>
where
    F: FnOnce(&mut Context),
{
    run_gatekeeper(chain, AdvicePhase::Before, ctx)?;

    if chain.has_around() {
        run_gatekeeper(chain, AdvicePhase::Around, ctx)?;
        if ctx.is_skipped() {
            debug!(function = %ctx.function(), "target skipped by around advice");
            if ctx.error().is_none() && !ctx.has_panic() {
                run_observer(chain, AdvicePhase::AfterReturning, ctx);
            }
            return Ok(());
        }
    }

    thunk(ctx);

    if ctx.error().is_none() && !ctx.has_panic() {
        run_observer(chain, AdvicePhase::AfterReturning, ctx);
    }
    Ok(())
}

fn run_gatekeeper(chain: &AdviceChain, phase: AdvicePhase, ctx: &mut Context) -> Result<(), AdviceAbort> {
    chain.execute_phase(phase, ctx).map_err(|source| AdviceAbort {
        function: ctx.function().clone(),
        phase,
        source,
    })
}

/// Run an observer phase, discarding its errors and handler panics.
fn run_observer(chain: &AdviceChain, phase: AdvicePhase, ctx: &mut Context) {
    match panic::catch_unwind(AssertUnwindSafe(|| chain.execute_phase(phase, ctx))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(function = %ctx.function(), phase = %phase, error = %err, "observer advice failed, ignoring");
        }
        Err(payload) => {
            let message = payload_message(payload.as_ref());
            warn!(function = %ctx.function(), phase = %phase, error = %message, "observer advice panicked, ignoring");
        }
    }
}
