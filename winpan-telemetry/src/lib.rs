//! # winpan Telemetry
//!
//! Logging and metrics for the panning daemon.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;

/// Error raised while registering or encoding metrics.
pub use prometheus::Error as MetricsError;
