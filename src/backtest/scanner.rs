//! Batch-wise backtest scan

use super::{BacktestSettings, TimeGroupCursor};
use crate::execution::Broker;
use crate::market::{MarketData, Selection};
use crate::provider::DataProvider;
use crate::segmentation::{self, PriceMode};
use crate::signal::TradeSignal;
use crate::strategy::{place_signals, OrderRouting, RunState, StrategyControl, StrategyError};
use crate::telemetry::{self, CounterMetric, GaugeMetric, LatencyMetric};
use std::time::Instant;

const EVALUATE_OPERATION: &str = "backtest.evaluate";
const ORDER_OPERATION: &str = "backtest.place_order";

/// Outcome of one scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Signals in emission order
    pub signals: Vec<TradeSignal>,
    /// Timestamp groups processed
    pub iterations: usize,
    /// Selections that had data
    pub instruments: usize,
    /// Stopped because the run state left `Backtesting`
    pub cancelled: bool,
}

/// Drives a detector through history one timestamp group at a time.
///
/// Every step evaluates the group's windows (through segmentation when
/// enabled), feeds each member's current bar to the broker, then places the
/// resulting orders. A failing evaluation is reported as an alert and the
/// scan continues with the next group. A scan started while `Backtesting`
/// checks the run state once per group and stops when it has changed.
pub struct BacktestScanner<'a> {
    provider: &'a dyn DataProvider,
    broker: &'a dyn Broker,
    routing: &'a dyn OrderRouting,
    control: &'a StrategyControl,
    settings: BacktestSettings,
    accounts: Vec<String>,
    segmentation: Option<PriceMode>,
}

impl<'a> BacktestScanner<'a> {
    pub fn new(
        provider: &'a dyn DataProvider,
        broker: &'a dyn Broker,
        routing: &'a dyn OrderRouting,
        control: &'a StrategyControl,
    ) -> Self {
        Self {
            provider,
            broker,
            routing,
            control,
            settings: BacktestSettings::default(),
            accounts: Vec::new(),
            segmentation: None,
        }
    }

    pub fn with_settings(mut self, settings: BacktestSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Accounts orders are placed on
    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Replay each trigger bar along the given intrabar path
    pub fn with_segmentation(mut self, mode: PriceMode) -> Self {
        self.segmentation = Some(mode);
        self
    }

    /// Resolve data for `selections` and scan it.
    ///
    /// Returns an empty report without touching the provider when
    /// `batch_size` is zero, and an empty report when no selection has data.
    pub async fn run<D>(&self, selections: &[Selection], batch_size: usize, detect: D) -> ScanReport
    where
        D: FnMut(&MarketData) -> Result<Vec<TradeSignal>, StrategyError> + Send,
    {
        if batch_size < 1 {
            tracing::debug!("Backtest batch size is zero, nothing to scan");
            return ScanReport::default();
        }

        let data = self.settings.resolve(selections, self.provider);
        if data.is_empty() {
            self.control
                .alerts()
                .alert(EVALUATE_OPERATION, "no bar data for any requested selection");
            return ScanReport::default();
        }

        self.scan(&data, batch_size, detect).await
    }

    /// Scan already resolved data
    pub async fn scan<D>(&self, data: &MarketData, batch_size: usize, mut detect: D) -> ScanReport
    where
        D: FnMut(&MarketData) -> Result<Vec<TradeSignal>, StrategyError> + Send,
    {
        let mut report = ScanReport {
            instruments: data.len(),
            ..ScanReport::default()
        };
        if batch_size < 1 || data.is_empty() {
            return report;
        }

        let started = Instant::now();
        let alerts = self.control.alerts();
        let cancellable = self.control.state() == RunState::Backtesting;
        let mut cursor = TimeGroupCursor::new(data);

        while let Some(group) = cursor.next() {
            report.iterations += 1;
            telemetry::increment(CounterMetric::BacktestIterations, 1);

            let mut window = MarketData::with_capacity(group.members.len());
            let mut current = Vec::with_capacity(group.members.len());
            for member in &group.members {
                let Some((selection, bars)) = data.entry(member.entry) else {
                    continue;
                };
                let window_end = member.position.checked_add(batch_size);
                let Some(slice) = window_end.and_then(|end| bars.get(member.position..end)) else {
                    continue;
                };
                window.insert(selection.clone(), slice.to_vec());
                current.push((selection.symbol.clone(), bars[member.position].clone()));
            }

            if !window.is_empty() {
                let eval_start = Instant::now();
                let evaluated = match self.segmentation {
                    Some(mode) => segmentation::run_segmented(mode, &window, &mut detect),
                    None => detect(&window),
                };
                telemetry::record_latency(LatencyMetric::StrategyInvocation, eval_start.elapsed());

                for (symbol, bar) in &current {
                    self.broker.process_bar(symbol, bar).await;
                }

                match evaluated {
                    Ok(signals) => {
                        place_signals(
                            self.broker,
                            &self.accounts,
                            self.routing,
                            &signals,
                            alerts,
                            ORDER_OPERATION,
                        )
                        .await;
                        report.signals.extend(signals);
                    }
                    Err(e) => {
                        telemetry::increment(CounterMetric::StrategyFailures, 1);
                        alerts.alert(
                            EVALUATE_OPERATION,
                            format!("step at {} abandoned: {}", group.timestamp, e),
                        );
                    }
                }
            }

            let progress = cursor.progress_pct();
            self.control.set_progress(progress);
            telemetry::set_gauge(GaugeMetric::BacktestProgress, f64::from(progress));

            if cancellable && self.control.state() != RunState::Backtesting {
                tracing::info!(at = %group.timestamp, "Backtest cancelled");
                report.cancelled = true;
                break;
            }
        }

        if !report.cancelled {
            self.control.set_progress(100);
        }
        telemetry::record_latency(LatencyMetric::BacktestRun, started.elapsed());
        tracing::info!(
            iterations = report.iterations,
            signals = report.signals.len(),
            cancelled = report.cancelled,
            "Backtest scan finished"
        );
        report
    }
}
