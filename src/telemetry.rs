use std::time::Duration;

use hdrhistogram::Histogram;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Returns `false` when one was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
    {
        Ok(()) => true,
        Err(err) => {
            debug!(%err, "tracing subscriber already installed, keeping it");
            false
        }
    }
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;

    info!(port, "prometheus exporter listening on /metrics");
    metrics::gauge!("depthx_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_port: u16) -> anyhow::Result<()> {
    Ok(())
}

/// Microsecond latency histogram for pipeline recomputes.
pub struct LatencyRecorder {
    hist: Option<Histogram<u64>>,
}

impl LatencyRecorder {
    pub fn new() -> Self {
        // up to 10s in us
        let hist = match Histogram::new_with_bounds(1, 10_000_000, 3) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(error = %e, "latency histogram disabled");
                None
            }
        };
        Self { hist }
    }

    pub fn record(&mut self, elapsed: Duration) {
        if let Some(h) = self.hist.as_mut() {
            h.saturating_record((elapsed.as_micros() as u64).max(1));
        }
    }

    pub fn count(&self) -> u64 {
        self.hist.as_ref().map_or(0, |h| h.len())
    }

    /// (p50, p99, max) in microseconds.
    pub fn percentiles(&self) -> Option<(u64, u64, u64)> {
        let h = self.hist.as_ref().filter(|h| !h.is_empty())?;
        Some((h.value_at_quantile(0.50), h.value_at_quantile(0.99), h.max()))
    }

    pub fn log_summary(&self, what: &str) {
        match self.percentiles() {
            Some((p50, p99, max)) => {
                info!(what, count = self.count(), p50_us = p50, p99_us = p99, max_us = max, "latency summary")
            }
            None => info!(what, "no latency samples"),
        }
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}
