//! Cancellation signal carried by each [`Context`](crate::Context).
//!
//! The core never starts timers. A signal is built by the caller from a
//! `CancellationToken`, a deadline, or both, and the advice chain polls it
//! before every handler.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::errors::CancelError;

/// Externally controlled cancellation token and/or deadline.
///
/// The default value never trips.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never trips.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// A signal driven by the given token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token: Some(token),
            deadline: None,
        }
    }

    /// Add (or replace) an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Add a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// The underlying token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` if neither a token nor a deadline is attached.
    #[must_use]
    pub fn is_never(&self) -> bool {
        self.token.is_none() && self.deadline.is_none()
    }

    /// Returns `true` once the token is cancelled or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Check the signal without blocking.
    ///
    /// Token cancellation is reported ahead of an expired deadline.
    pub fn check(&self) -> Result<(), CancelError> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(CancelError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(CancelError::DeadlineExceeded);
        }
        Ok(())
    }
}
