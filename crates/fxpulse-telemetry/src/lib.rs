//! Prometheus metrics and structured logging for fxpulse.
//!
//! - Prometheus counters for fetch attempts, source wins, fallbacks and alerts
//! - Structured logging with tracing (JSON in production, pretty otherwise)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat, DEFAULT_FILTER};
pub use metrics::Metrics;
