use std::path::PathBuf;

use thiserror::Error;
use winpan_engine::EngineError;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("scenario refers to unknown window {0:#x}")]
    UnknownWindow(u64),

    #[error("metrics setup failed: {0}")]
    Metrics(#[from] winpan_telemetry::MetricsError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("state hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}
