//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    /// Render the metrics registry at debug level on shutdown.
    pub dump_on_exit: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { dump_on_exit: true }
    }
}

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[validate(custom(function = validation::validate_log_level))]
    pub log_level: String,

    /// Metrics collection parameters.
    #[validate(nested)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            metrics: MetricsConfig::default(),
        }
    }
}
