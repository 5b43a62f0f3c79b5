//! ## winpan-telemetry::metrics
//! **Prometheus counters and histograms**

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub window_events: IntCounter,
    pub volume_adjustments: IntCounter,
    pub untracked_sink_inputs: IntCounter,
    pub scan_failures: IntCounter,
    pub scan_latency: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let window_events =
            IntCounter::new("winpan_window_events_total", "Window geometry changes handled")?;
        let volume_adjustments = IntCounter::new(
            "winpan_volume_adjustments_total",
            "Sink-input volume commands issued",
        )?;
        let untracked_sink_inputs = IntCounter::new(
            "winpan_untracked_sink_inputs_total",
            "Sink inputs dropped because the table was full",
        )?;
        let scan_failures = IntCounter::new(
            "winpan_scan_failures_total",
            "Process scans aborted by sizing or source errors",
        )?;
        let scan_latency = Histogram::with_opts(
            HistogramOpts::new(
                "winpan_scan_latency_ns",
                "Process table scan and descendant walk time",
            )
            .buckets(vec![10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0, 100_000_000.0]),
        )?;

        registry.register(Box::new(window_events.clone()))?;
        registry.register(Box::new(volume_adjustments.clone()))?;
        registry.register(Box::new(untracked_sink_inputs.clone()))?;
        registry.register(Box::new(scan_failures.clone()))?;
        registry.register(Box::new(scan_latency.clone()))?;

        Ok(Self {
            registry,
            window_events,
            volume_adjustments,
            untracked_sink_inputs,
            scan_failures,
            scan_latency,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    pub fn observe_scan(&self, nanos: u64) {
        self.scan_latency.observe(nanos as f64);
    }
}
