//! Operations and observability.
//!
//! - [`observability`] - Metrics registry and engine metrics
//! - [`telemetry`] - Tracing subscriber setup

pub mod observability;
pub mod telemetry;
