//! Backtest scans end to end

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strategy_sim::backtest::BacktestScanner;
use strategy_sim::execution::SimulationBroker;
use strategy_sim::market::{Bar, Selection, SeriesKey, Tick, Timeframe};
use strategy_sim::provider::{synthetic, DataProvider, SimulatedDataProvider, SyntheticParams};
use strategy_sim::series::{Aggregator, SeriesStore};
use strategy_sim::signal::TradeSignal;
use strategy_sim::strategy::{
    BreakoutDetector, DirectRouting, RunState, SignalHost, StrategyControl, StrategyHost,
};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

fn selection(symbol: &str) -> Selection {
    Selection::new(symbol, "sim", Timeframe::minutes(1))
}

fn provider() -> SimulatedDataProvider {
    SimulatedDataProvider::new(Arc::new(Aggregator::new(Arc::new(SeriesStore::new()))))
}

fn register(provider: &SimulatedDataProvider, symbol: &str, minutes: &[u32]) {
    let bars = minutes
        .iter()
        .map(|m| Bar::flat(at(10, *m), dec!(1.1), dec!(1.1)))
        .collect();
    provider
        .store()
        .register(SeriesKey::new(symbol, "sim", Timeframe::minutes(1)), bars)
        .unwrap();
}

#[tokio::test]
async fn test_simultaneous_instruments_share_an_iteration() {
    let provider = provider();
    register(&provider, "A", &[0, 1, 2]);
    register(&provider, "B", &[0, 2]);
    let broker = SimulationBroker::new(dec!(0));
    let control = StrategyControl::new();
    control.set_state(RunState::Backtesting);

    let mut groups: Vec<Vec<(String, DateTime<Utc>)>> = Vec::new();
    let report = BacktestScanner::new(&provider, &broker, &DirectRouting, &control)
        .run(&[selection("A"), selection("B")], 1, |data| {
            groups.push(
                data.iter()
                    .map(|(s, bars)| (s.symbol.clone(), bars[0].timestamp))
                    .collect(),
            );
            Ok(Vec::new())
        })
        .await;

    assert_eq!(report.iterations, 3);
    assert_eq!(
        groups,
        vec![
            vec![("A".to_string(), at(10, 0)), ("B".to_string(), at(10, 0))],
            vec![("A".to_string(), at(10, 1))],
            vec![("A".to_string(), at(10, 2)), ("B".to_string(), at(10, 2))],
        ]
    );
}

/// Counts bar requests so a test can prove the provider was not consulted
struct CountingProvider {
    inner: SimulatedDataProvider,
    requests: AtomicUsize,
}

impl DataProvider for CountingProvider {
    fn bars(&self, selection: &Selection) -> Vec<Bar> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.bars(selection)
    }

    fn bars_between(
        &self,
        selection: &Selection,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<Bar> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.bars_between(selection, from, to)
    }

    fn last_tick(&self, data_feed: &str, symbol: &str) -> Option<Tick> {
        self.inner.last_tick(data_feed, symbol)
    }

    fn tick(&self, data_feed: &str, symbol: &str, timestamp: DateTime<Utc>) -> Option<Tick> {
        self.inner.tick(data_feed, symbol, timestamp)
    }

    fn data_feeds(&self) -> Vec<String> {
        self.inner.data_feeds()
    }

    fn symbols(&self, data_feed: &str) -> Vec<String> {
        self.inner.symbols(data_feed)
    }
}

#[tokio::test]
async fn test_zero_batch_skips_provider() {
    let counting = CountingProvider {
        inner: provider(),
        requests: AtomicUsize::new(0),
    };
    register(&counting.inner, "A", &[0, 1, 2]);
    let broker = SimulationBroker::new(dec!(0));
    let control = StrategyControl::new();

    let report = BacktestScanner::new(&counting, &broker, &DirectRouting, &control)
        .run(&[selection("A")], 0, |_| Ok(Vec::new()))
        .await;

    assert!(report.signals.is_empty());
    assert_eq!(counting.requests.load(Ordering::SeqCst), 0);
}

/// EURUSD as defined in `config.toml.example`; its history has breakouts
fn breakout_run_params() -> SyntheticParams {
    SyntheticParams {
        symbol: "EURUSD".to_string(),
        data_feed: "sim".to_string(),
        timeframe: Timeframe::minutes(1),
        bars: 500,
        ticks: 200,
        depth_levels: 3,
        price_min: dec!(1.05),
        price_max: dec!(1.15),
        slot: Some(1),
        seed: 42,
    }
}

#[tokio::test]
async fn test_repeated_backtests_are_identical() {
    let provider = Arc::new(provider());
    provider
        .load(synthetic::generate(&breakout_run_params(), at(0, 0)))
        .unwrap();
    let broker = Arc::new(SimulationBroker::new(dec!(0)).with_account("demo", "sim", dec!(10000)));

    let mut host = SignalHost::new(
        Box::new(BreakoutDetector::with_defaults()),
        provider,
        broker,
    )
    .unwrap();
    host.init(vec![selection("EURUSD").with_slot(1)]).unwrap();

    let first: Vec<TradeSignal> = host.backtest().await.unwrap().signals;
    let second = host.backtest().await.unwrap().signals;
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(host.control().state(), RunState::Stopped);
}

#[tokio::test]
async fn test_cancellation_from_another_handle() {
    let provider = provider();
    register(&provider, "A", &[0, 1, 2, 3, 4, 5]);
    let broker = SimulationBroker::new(dec!(0));
    let control = StrategyControl::new();
    control.set_state(RunState::Backtesting);

    let remote = control.clone();
    let mut seen = 0;
    let report = BacktestScanner::new(&provider, &broker, &DirectRouting, &control)
        .run(&[selection("A")], 1, |_| {
            seen += 1;
            if seen == 2 {
                remote.set_state(RunState::Stopped);
            }
            Ok(Vec::new())
        })
        .await;

    assert!(report.cancelled);
    assert_eq!(report.iterations, 2);
    assert_eq!(seen, 2);
}
