//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One strategy invocation (live or one backtest step)
    StrategyInvocation,
    /// Full backtest pass
    BacktestRun,
    /// Order placement through the broker
    OrderPlacement,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Ticks folded into a series
    TicksAppended,
    /// Bars closed by the aggregator
    BarsCompleted,
    /// Timestamp groups processed by the scanner
    BacktestIterations,
    /// Trade signals produced
    TradeSignals,
    /// Strategy invocations that returned an error
    StrategyFailures,
    /// Orders refused by the broker
    BrokerRejections,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Backtest progress in percent
    BacktestProgress,
    /// Number of series held by the store
    SeriesCount,
    /// Open positions across all simulation accounts
    OpenPositions,
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::StrategyInvocation => "strategysim_strategy_invocation_latency_ms",
            LatencyMetric::BacktestRun => "strategysim_backtest_run_latency_ms",
            LatencyMetric::OrderPlacement => "strategysim_order_placement_latency_ms",
        }
    }
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::TicksAppended => "strategysim_ticks_appended_total",
            CounterMetric::BarsCompleted => "strategysim_bars_completed_total",
            CounterMetric::BacktestIterations => "strategysim_backtest_iterations_total",
            CounterMetric::TradeSignals => "strategysim_trade_signals_total",
            CounterMetric::StrategyFailures => "strategysim_strategy_failures_total",
            CounterMetric::BrokerRejections => "strategysim_broker_rejections_total",
        }
    }
}

impl GaugeMetric {
    pub fn name(&self) -> &'static str {
        match self {
            GaugeMetric::BacktestProgress => "strategysim_backtest_progress_pct",
            GaugeMetric::SeriesCount => "strategysim_series_count",
            GaugeMetric::OpenPositions => "strategysim_open_positions",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Increment a counter
pub fn increment(metric: CounterMetric, value: u64) {
    metrics::counter!(metric.name()).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus recorder with an HTTP listener on `port`
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
