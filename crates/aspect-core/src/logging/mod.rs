//! Structured logging setup.
//!
//! The engine logs through `tracing` with structured fields (`function`,
//! `phase`, `advice`, `priority`, `error`). Discarded observer failures are
//! emitted at `warn`; registration changes at `debug`; per-handler execution
//! at `trace`.
//!
//! Hosts that already install a subscriber need nothing from here.
//! [`init_subscriber`] is a convenience for binaries and demos, and
//! [`test_utils`] captures events for assertions in tests.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` takes precedence over `level` when set. Subsequent calls are
/// no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}
