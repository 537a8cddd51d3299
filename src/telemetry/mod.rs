//! Logging and Prometheus metrics for engine runs

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{
    increment, install_exporter, record_latency, set_gauge, CounterMetric, GaugeMetric,
    LatencyMetric,
};

use crate::config::TelemetryConfig;

/// Handle returned by [`init_telemetry`]; hold it for the life of the process
pub struct TelemetryGuard {
    metrics_port: Option<u16>,
}

impl TelemetryGuard {
    /// Port of the Prometheus listener, if one was installed
    pub fn metrics_port(&self) -> Option<u16> {
        self.metrics_port
    }
}

/// Set up the tracing subscriber and, when a port is configured, the metrics
/// exporter. Without an exporter every metric call is a no-op.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        install_exporter(port)?;
    } else {
        tracing::debug!("No metrics port configured, metrics are not exported");
    }

    Ok(TelemetryGuard {
        metrics_port: config.metrics_port,
    })
}
