//! Error types for registration, phase execution, and settings.

use thiserror::Error;

use crate::types::{AdvicePhase, FunctionKey};

/// Configuration errors returned by the [`Registry`](crate::Registry).
///
/// These are recoverable: they are returned normally and never unwind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The function key was empty.
    #[error("function key cannot be empty")]
    InvalidKey,

    /// The function key is already registered.
    #[error("function '{0}' is already registered")]
    DuplicateKey(FunctionKey),

    /// The function key has not been registered.
    #[error("function '{0}' is not registered")]
    NotRegistered(FunctionKey),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Why a [`CancelSignal`](crate::CancelSignal) tripped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// The cancellation token was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Why an advice phase stopped before running all of its handlers.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The context's cancellation signal tripped before a handler ran.
    #[error("{phase} phase interrupted: {reason}")]
    Interrupted {
        /// Phase that was running.
        phase: AdvicePhase,
        /// Cancellation reason.
        #[source]
        reason: CancelError,
    },

    /// A handler returned an error.
    #[error("{phase} advice '{advice}' failed: {source}")]
    Handler {
        /// Phase that was running.
        phase: AdvicePhase,
        /// Advice name, or `<anonymous>`.
        advice: String,
        /// Error returned by the handler.
        #[source]
        source: anyhow::Error,
    },
}

impl PhaseError {
    /// The phase that failed.
    #[must_use]
    pub fn phase(&self) -> AdvicePhase {
        match self {
            Self::Interrupted { phase, .. } | Self::Handler { phase, .. } => *phase,
        }
    }

    /// Returns `true` if the phase stopped because of cancellation.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// A gatekeeper veto.
///
/// Raised when `Before` or `Around` advice fails. The engine funnels it into
/// the same path as a target panic: it becomes the context's panic payload,
/// `AfterThrowing` and `After` run, and the call unwinds with this value as
/// the payload. Callers that catch the unwind can `downcast_ref::<AdviceAbort>()`
/// to tell a veto apart from a panic in the target itself.
#[derive(Debug, Error)]
#[error("{phase} advice aborted call to '{function}': {source}")]
pub struct AdviceAbort {
    /// Function whose call was aborted.
    pub function: FunctionKey,
    /// Gatekeeper phase that failed.
    pub phase: AdvicePhase,
    /// Underlying phase failure.
    #[source]
    pub source: PhaseError,
}

/// Errors from parsing or validating [`EngineSettings`](crate::EngineSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to parse settings JSON.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A settings value was out of range.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
