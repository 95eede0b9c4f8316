//! Per-invocation execution context.
//!
//! A [`Context`] is created for every call routed through the engine and is
//! threaded through all advice phases and the target thunk. It carries the
//! call's arguments, result slots, application error, captured panic
//! payload, skip flag, cancellation signal, and a [`Metadata`] store that
//! advice uses to pass values from one phase to the next.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::cancel::CancelSignal;
use crate::errors::AdviceAbort;
use crate::types::{FunctionKey, ResultSlot, Value};

/// String-keyed store of opaque values shared between advice handlers.
///
/// Safe for concurrent reads and writes even though the engine only ever
/// touches a context from the calling thread.
#[derive(Default)]
pub struct Metadata {
    entries: DashMap<String, Value>,
}

impl Metadata {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for the key.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Option<Value> {
        self.entries.insert(key.into(), Arc::new(value))
    }

    /// Insert an already-wrapped [`Value`].
    pub fn insert_value(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Get the raw value for a key.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| Arc::clone(v.value()))
    }

    /// Get a value as `T`. Returns `None` if absent or of another type.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get_value(key).and_then(|v| v.downcast::<T>().ok())
    }

    /// Get a clone of a value as `T`.
    #[must_use]
    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|v| v.value().downcast_ref::<T>().cloned())
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metadata").field("keys", &self.keys()).finish()
    }
}

/// Execution state for a single call.
pub struct Context {
    function: FunctionKey,
    args: Vec<Value>,
    results: Vec<Option<ResultSlot>>,
    error: Option<anyhow::Error>,
    panic: Option<Box<dyn Any + Send>>,
    metadata: Metadata,
    skipped: bool,
    signal: CancelSignal,
}

impl Context {
    /// Create a context for `function` with the given arguments and a
    /// non-cancellable signal.
    pub fn new(function: impl Into<FunctionKey>, args: Vec<Value>) -> Self {
        Self::with_signal(function, args, CancelSignal::never())
    }

    /// Create a context carrying the given cancellation signal.
    pub fn with_signal(
        function: impl Into<FunctionKey>,
        args: Vec<Value>,
        signal: CancelSignal,
    ) -> Self {
        Self {
            function: function.into(),
            args,
            results: Vec::new(),
            error: None,
            panic: None,
            metadata: Metadata::new(),
            skipped: false,
            signal,
        }
    }

    /// Key of the function being invoked.
    #[must_use]
    pub fn function(&self) -> &FunctionKey {
        &self.function
    }

    /// Arguments in call order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument `index` as `T`. Returns `None` if absent or of another type.
    #[must_use]
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get(index).and_then(|v| v.downcast_ref::<T>())
    }

    /// Store a result at `index`, growing the slot list with empty slots
    /// as needed.
    ///
    /// # Panics
    ///
    /// Panics if `index` is `usize::MAX`.
    pub fn set_result<T: Any + Send>(&mut self, index: usize, value: T) {
        self.set_result_slot(index, Box::new(value));
    }

    /// Store an already-boxed result at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is `usize::MAX`.
    pub fn set_result_slot(&mut self, index: usize, value: ResultSlot) {
        if self.results.len() <= index {
            let Some(len) = index.checked_add(1) else {
                panic!("result index {index} out of range");
            };
            self.results.resize_with(len, || None);
        }
        self.results[index] = Some(value);
    }

    /// Result `index` as `T`. Returns `None` if the slot is empty, out of
    /// range, or of another type.
    #[must_use]
    pub fn result<T: Any>(&self, index: usize) -> Option<&T> {
        self.results
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Move result `index` out as `T`.
    ///
    /// A slot holding another type is left untouched and `None` is returned.
    pub fn take_result<T: Any>(&mut self, index: usize) -> Option<T> {
        let slot = self.results.get_mut(index)?;
        if !slot.as_ref().is_some_and(|v| v.is::<T>()) {
            return None;
        }
        slot.take()
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Returns `true` if slot `index` holds a value.
    #[must_use]
    pub fn has_result(&self, index: usize) -> bool {
        self.results.get(index).is_some_and(Option::is_some)
    }

    /// All result slots. Unset slots are `None`.
    #[must_use]
    pub fn results(&self) -> &[Option<ResultSlot>] {
        &self.results
    }

    /// Number of result slots, including empty placeholders.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Application error set by the target or by advice.
    #[must_use]
    pub fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    /// Set (or overwrite) the application error.
    pub fn set_error(&mut self, error: impl Into<anyhow::Error>) {
        self.error = Some(error.into());
    }

    /// Take the application error out of the context.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    /// Clear the application error, suppressing it.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Returns `true` if the call unwound (target panic or gatekeeper veto).
    #[must_use]
    pub fn has_panic(&self) -> bool {
        self.panic.is_some()
    }

    /// The captured unwind payload, if any.
    #[must_use]
    pub fn panic_value(&self) -> Option<&(dyn Any + Send)> {
        self.panic.as_deref()
    }

    /// Best-effort text of the captured unwind payload.
    ///
    /// Handles `&str` and `String` payloads (what `panic!` produces) and
    /// [`AdviceAbort`].
    #[must_use]
    pub fn panic_message(&self) -> Option<String> {
        self.panic_value().map(payload_message)
    }

    pub(crate) fn set_panic(&mut self, payload: Box<dyn Any + Send>) {
        self.panic = Some(payload);
    }

    pub(crate) fn take_panic(&mut self) -> Option<Box<dyn Any + Send>> {
        self.panic.take()
    }

    /// Returns `true` if Around advice asked for the target to be skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Set the skip flag. Only honored when set during the Around phase.
    pub fn set_skipped(&mut self, skipped: bool) {
        self.skipped = skipped;
    }

    /// Metadata shared across the call's advice.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Cancellation signal for this call.
    #[must_use]
    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    /// Clear all per-call state, keeping allocated capacity.
    pub fn reset(&mut self) {
        self.function = FunctionKey::default();
        self.args.clear();
        self.results.clear();
        self.error = None;
        self.panic = None;
        self.metadata.clear();
        self.skipped = false;
        self.signal = CancelSignal::never();
    }

    /// Install a new call's identity after a reset. Used by the pool.
    pub(crate) fn prepare(&mut self, function: FunctionKey, args: Vec<Value>, signal: CancelSignal) {
        self.function = function;
        self.args = args;
        self.signal = signal;
    }

    /// Replace storage that grew beyond the given bounds.
    pub(crate) fn shrink(&mut self, max_results: usize, max_metadata: usize) {
        if self.results.capacity() > max_results {
            self.results = Vec::new();
        }
        if self.metadata.len() > max_metadata {
            self.metadata = Metadata::new();
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("function", &self.function)
            .field("args", &self.args.len())
            .field("results", &self.results.len())
            .field("error", &self.error.as_ref().map(ToString::to_string))
            .field("panic", &self.panic_message())
            .field("skipped", &self.skipped)
            .field("metadata", &self.metadata)
            .finish()
    }
}

pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(abort) = payload.downcast_ref::<AdviceAbort>() {
        abort.to_string()
    } else {
        "<non-string panic payload>".to_string()
    }
}
