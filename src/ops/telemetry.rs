//! Tracing subscriber setup.
//!
//! The engine itself only emits `tracing` events. Embedding processes call
//! [`init_tracing`] once at startup to route them to stdout; `RUST_LOG`
//! overrides the configured level.

use crate::core::config::TelemetryConfig;

/// Install the global fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed, which
/// is not an error: tests and embedding hosts often install their own.
#[cfg(feature = "telemetry")]
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_config: &TelemetryConfig) -> bool {
    false
}
