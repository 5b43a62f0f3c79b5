//! ## winpan-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Later calls are no-ops.
    pub fn init(default_level: &str) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init();
    }

    /// Records one handled window move.
    #[inline]
    pub fn log_window_event(window: u64, pid: i32, x: i32, width: u32, adjusted: usize) {
        let span = info_span!("window_event", window, pid);
        let _guard = span.enter();
        tracing::info!(x, width, adjusted, "window moved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_logging() {
        EventLogger::log_window_event(0x2a, 1200, 640, 800, 2);
        assert!(logs_contain("window moved"));
        assert!(logs_contain("adjusted=2"));
    }
}
