//! Advice units and per-function advice chains.
//!
//! An [`AdviceChain`] keeps one append-only bucket per [`AdvicePhase`].
//! Buckets are sorted by priority (descending, stable) when a phase runs,
//! not when advice is added, so advice can be attached at any time and the
//! next call picks it up.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::context::Context;
use crate::errors::PhaseError;
use crate::types::AdvicePhase;

/// Callback invoked by an advice phase.
///
/// Implemented for any `Fn(&mut Context) -> anyhow::Result<()>` closure, so
/// most callers never implement it by hand.
pub trait AdviceHandler: Send + Sync {
    /// Run the advice against the call's context.
    ///
    /// Errors from gatekeeper phases abort the call; errors from observer
    /// phases are logged and discarded by the engine.
    fn handle(&self, ctx: &mut Context) -> anyhow::Result<()>;
}

impl<F> AdviceHandler for F
where
    F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self(ctx)
    }
}

/// A handler tagged with its phase and priority.
///
/// Immutable once built. Higher priority runs first within a phase; equal
/// priorities keep insertion order.
#[derive(Clone)]
pub struct Advice {
    phase: AdvicePhase,
    priority: i32,
    name: Option<Arc<str>>,
    handler: Arc<dyn AdviceHandler>,
}

impl Advice {
    /// Create advice for `phase` with priority 0.
    pub fn new<F>(phase: AdvicePhase, handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_handler(phase, handler)
    }

    /// Create advice from any [`AdviceHandler`] implementation.
    pub fn from_handler(phase: AdvicePhase, handler: impl AdviceHandler + 'static) -> Self {
        Self {
            phase,
            priority: 0,
            name: None,
            handler: Arc::new(handler),
        }
    }

    /// `Before` advice.
    pub fn before<F>(handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(AdvicePhase::Before, handler)
    }

    /// `Around` advice.
    pub fn around<F>(handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(AdvicePhase::Around, handler)
    }

    /// `After` advice.
    pub fn after<F>(handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(AdvicePhase::After, handler)
    }

    /// `AfterReturning` advice.
    pub fn after_returning<F>(handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(AdvicePhase::AfterReturning, handler)
    }

    /// `AfterThrowing` advice.
    pub fn after_throwing<F>(handler: F) -> Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(AdvicePhase::AfterThrowing, handler)
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Name used in logs and error messages.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Phase this advice runs in.
    #[must_use]
    pub fn phase(&self) -> AdvicePhase {
        self.phase
    }

    /// Priority within the phase.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Name, or `<anonymous>`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        self.handler.handle(ctx)
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Per-function collection of advice, one bucket per phase.
///
/// Guarded by its own lock, independent of the registry's, so configuring
/// one function never blocks calls to another.
#[derive(Default)]
pub struct AdviceChain {
    buckets: RwLock<[Vec<Advice>; AdvicePhase::COUNT]>,
}

impl AdviceChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append advice to the bucket for its phase.
    pub fn add(&self, advice: Advice) {
        self.buckets.write()[advice.phase.index()].push(advice);
    }

    /// Run every handler of `phase` against `ctx`.
    ///
    /// The bucket is snapshotted under the read lock, so handlers may add
    /// advice to this chain without deadlocking; additions apply to the next
    /// run. Before each handler the context's cancellation signal is checked.
    /// The first cancellation or handler error stops the phase and is
    /// returned; the remaining handlers do not run.
    pub fn execute_phase(&self, phase: AdvicePhase, ctx: &mut Context) -> Result<(), PhaseError> {
        let mut snapshot = self.snapshot(phase);
        if snapshot.is_empty() {
            return Ok(());
        }
        snapshot.sort_by_key(|a| Reverse(a.priority));

        for advice in &snapshot {
            ctx.signal()
                .check()
                .map_err(|reason| PhaseError::Interrupted { phase, reason })?;

            trace!(
                function = %ctx.function(),
                phase = %phase,
                advice = advice.name(),
                priority = advice.priority,
                "running advice"
            );
            advice.run(ctx).map_err(|source| PhaseError::Handler {
                phase,
                advice: advice.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Copy of the bucket for `phase`, in insertion order.
    #[must_use]
    pub fn snapshot(&self, phase: AdvicePhase) -> Vec<Advice> {
        self.buckets.read()[phase.index()].clone()
    }

    /// Returns `true` if any `Around` advice is attached.
    #[must_use]
    pub fn has_around(&self) -> bool {
        !self.buckets.read()[AdvicePhase::Around.index()].is_empty()
    }

    /// Number of advice in one phase.
    #[must_use]
    pub fn phase_count(&self, phase: AdvicePhase) -> usize {
        self.buckets.read()[phase.index()].len()
    }

    /// Total advice across all phases.
    #[must_use]
    pub fn count(&self) -> usize {
        self.buckets.read().iter().map(Vec::len).sum()
    }
}

impl fmt::Debug for AdviceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceChain")
            .field("advice_count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;
    use crate::errors::CancelError;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, phase: AdvicePhase, tag: &str) -> Advice {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Advice::new(phase, move |_ctx: &mut Context| {
            log.lock().push(tag.clone());
            Ok(())
        })
    }

    fn ctx() -> Context {
        Context::new("f", Vec::new())
    }

    #[test]
    fn new_chain_is_empty() {
        let chain = AdviceChain::new();
        assert_eq!(chain.count(), 0);
        assert!(!chain.has_around());
    }

    #[test]
    fn add_routes_by_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        chain.add(recorder(&log, AdvicePhase::Before, "b"));
        chain.add(recorder(&log, AdvicePhase::Around, "r"));
        chain.add(recorder(&log, AdvicePhase::After, "a"));
        chain.add(recorder(&log, AdvicePhase::After, "a2"));

        assert_eq!(chain.count(), 4);
        assert!(chain.has_around());
        assert_eq!(chain.phase_count(AdvicePhase::After), 2);
        assert_eq!(chain.phase_count(AdvicePhase::AfterThrowing), 0);
    }

    #[test]
    fn executes_in_descending_priority() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        chain.add(recorder(&log, AdvicePhase::Before, "low").with_priority(10));
        chain.add(recorder(&log, AdvicePhase::Before, "high").with_priority(100));
        chain.add(recorder(&log, AdvicePhase::Before, "mid").with_priority(50));

        chain.execute_phase(AdvicePhase::Before, &mut ctx()).unwrap();
        assert_eq!(*log.lock(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        for tag in ["first", "second", "third"] {
            chain.add(recorder(&log, AdvicePhase::After, tag));
        }
        chain.execute_phase(AdvicePhase::After, &mut ctx()).unwrap();
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn only_requested_phase_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        chain.add(recorder(&log, AdvicePhase::Before, "b"));
        chain.add(recorder(&log, AdvicePhase::After, "a"));
        chain.execute_phase(AdvicePhase::After, &mut ctx()).unwrap();
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn handler_error_stops_phase() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        chain.add(recorder(&log, AdvicePhase::Before, "first").with_priority(3));
        chain.add(
            Advice::before(|_ctx: &mut Context| anyhow::bail!("denied"))
                .with_priority(2)
                .with_name("auth"),
        );
        chain.add(recorder(&log, AdvicePhase::Before, "never").with_priority(1));

        let err = chain.execute_phase(AdvicePhase::Before, &mut ctx()).unwrap_err();
        assert_matches!(
            &err,
            PhaseError::Handler { phase: AdvicePhase::Before, advice, .. } if advice == "auth"
        );
        assert!(err.to_string().contains("denied"));
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn cancelled_signal_stops_before_first_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = AdviceChain::new();
        chain.add(recorder(&log, AdvicePhase::Before, "never"));

        let token = CancellationToken::new();
        token.cancel();
        let mut c = Context::with_signal("f", Vec::new(), CancelSignal::from_token(token));

        let err = chain.execute_phase(AdvicePhase::Before, &mut c).unwrap_err();
        assert_matches!(
            err,
            PhaseError::Interrupted { phase: AdvicePhase::Before, reason: CancelError::Cancelled }
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn cancellation_mid_phase_stops_remaining_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        let chain = AdviceChain::new();
        let canceller = token.clone();
        chain.add(
            Advice::before(move |_ctx: &mut Context| {
                canceller.cancel();
                Ok(())
            })
            .with_priority(10),
        );
        chain.add(recorder(&log, AdvicePhase::Before, "never"));

        let mut c = Context::with_signal("f", Vec::new(), CancelSignal::from_token(token));
        let err = chain.execute_phase(AdvicePhase::Before, &mut c).unwrap_err();
        assert!(err.is_interrupted());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn handler_can_add_advice_during_execution() {
        let chain = Arc::new(AdviceChain::new());
        let inner = Arc::clone(&chain);
        chain.add(Advice::before(move |_ctx: &mut Context| {
            inner.add(Advice::before(|_ctx: &mut Context| Ok(())));
            Ok(())
        }));

        chain.execute_phase(AdvicePhase::Before, &mut ctx()).unwrap();
        assert_eq!(chain.phase_count(AdvicePhase::Before), 2);
    }

    #[test]
    fn handlers_mutate_context() {
        let chain = AdviceChain::new();
        chain.add(Advice::around(|ctx: &mut Context| {
            ctx.set_skipped(true);
            ctx.set_result(0, "cached");
            Ok(())
        }));
        let mut c = ctx();
        chain.execute_phase(AdvicePhase::Around, &mut c).unwrap();
        assert!(c.is_skipped());
        assert_eq!(c.result::<&str>(0), Some(&"cached"));
    }

    #[test]
    fn advice_accessors_and_debug() {
        let advice = Advice::after_throwing(|_ctx: &mut Context| Ok(()))
            .with_priority(-5)
            .with_name("recorder");
        assert_eq!(advice.phase(), AdvicePhase::AfterThrowing);
        assert_eq!(advice.priority(), -5);
        assert_eq!(advice.name(), "recorder");
        let debug = format!("{advice:?}");
        assert!(debug.contains("AfterThrowing"));
        assert!(debug.contains("recorder"));

        let anon = Advice::after_returning(|_ctx: &mut Context| Ok(()));
        assert_eq!(anon.name(), "<anonymous>");
        assert_eq!(anon.priority(), 0);
    }

    struct Counter(std::sync::atomic::AtomicUsize);

    impl AdviceHandler for Counter {
        fn handle(&self, _ctx: &mut Context) -> anyhow::Result<()> {
            let _ = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn trait_objects_work_as_handlers() {
        let chain = AdviceChain::new();
        chain.add(Advice::from_handler(
            AdvicePhase::After,
            Counter(std::sync::atomic::AtomicUsize::new(0)),
        ));
        chain.execute_phase(AdvicePhase::After, &mut ctx()).unwrap();
        assert_eq!(chain.count(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn order_is_descending_priority_and_stable(priorities in proptest::collection::vec(-5i32..5, 0..24)) {
                let log = Arc::new(Mutex::new(Vec::new()));
                let chain = AdviceChain::new();
                for (i, p) in priorities.iter().enumerate() {
                    let log = Arc::clone(&log);
                    let p = *p;
                    chain.add(
                        Advice::before(move |_ctx: &mut Context| {
                            log.lock().push((p, i));
                            Ok(())
                        })
                        .with_priority(p),
                    );
                }
                chain.execute_phase(AdvicePhase::Before, &mut ctx()).unwrap();

                let ran = log.lock().clone();
                prop_assert_eq!(ran.len(), priorities.len());
                for pair in ran.windows(2) {
                    let (p0, i0) = pair[0];
                    let (p1, i1) = pair[1];
                    prop_assert!(p0 > p1 || (p0 == p1 && i0 < i1));
                }
            }
        }
    }
}
