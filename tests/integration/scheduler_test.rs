//! Live scheduling against the simulated stack

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use strategy_sim::execution::SimulationBroker;
use strategy_sim::market::{Bar, MarketData, SeriesKey, Selection, Tick, Timeframe};
use strategy_sim::provider::SimulatedDataProvider;
use strategy_sim::scheduler::{Scheduler, SchedulerError, SchedulerEvent};
use strategy_sim::series::{Aggregator, SeriesId, SeriesStore};
use strategy_sim::signal::{Side, TradeSignal};
use strategy_sim::strategy::{
    DetectContext, ParameterValue, RunState, SignalDetector, SignalHost, StrategyError,
    StrategyHost,
};
use tokio_test::{assert_err, assert_ok};

/// Buys one unit of the triggering instrument on every step
struct BuyEveryStep;

impl SignalDetector for BuyEveryStep {
    fn name(&self) -> &str {
        "buy-every-step"
    }

    fn detect(
        &mut self,
        data: &MarketData,
        context: &DetectContext,
    ) -> Result<Vec<TradeSignal>, StrategyError> {
        let Some((selection, bars)) = data.last() else {
            return Ok(Vec::new());
        };
        let Some(bar) = bars.last() else {
            return Ok(Vec::new());
        };
        let instrument = context.trigger.clone().unwrap_or_else(|| selection.clone());
        Ok(vec![TradeSignal::market(
            instrument,
            Side::Buy,
            bar.close_ask,
            dec!(1),
            bar.timestamp,
        )])
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::seconds(seconds)
}

fn start_event_values(start_event: &str) -> Vec<ParameterValue> {
    strategy_sim::config::StrategyConfig {
        start_event: start_event.to_string(),
        ..Default::default()
    }
    .parameter_values()
}

struct Live {
    scheduler: Scheduler,
    broker: Arc<SimulationBroker>,
    series: SeriesId,
}

fn live(start_event: &str) -> Live {
    let aggregator = Arc::new(Aggregator::new(Arc::new(SeriesStore::new())));
    let key = SeriesKey::new("EURUSD", "sim", Timeframe::minutes(1)).with_slot(1);
    let series = aggregator
        .store()
        .register(key, vec![Bar::flat(at(0), dec!(1.1), dec!(1.1002))])
        .unwrap();

    let provider = Arc::new(SimulatedDataProvider::new(Arc::clone(&aggregator)));
    let broker = Arc::new(SimulationBroker::new(dec!(0)).with_account("demo", "sim", dec!(10000)));
    let mut host = SignalHost::new(Box::new(BuyEveryStep), provider, broker.clone()).unwrap();
    host.set_parameters(&start_event_values(start_event)).unwrap();
    host.init(vec![Selection::new("EURUSD", "sim", Timeframe::minutes(1)).with_slot(1)])
        .unwrap();

    Live {
        scheduler: Scheduler::new(Box::new(host), aggregator),
        broker,
        series,
    }
}

fn tick(seconds: i64) -> Tick {
    Tick::new(at(seconds), dec!(1.1), dec!(1.1002))
}

async fn wait_for_orders(broker: &SimulationBroker, expected: usize) -> usize {
    for _ in 0..100 {
        let count = broker.orders().await.len();
        if count >= expected {
            return count;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    broker.orders().await.len()
}

#[tokio::test]
async fn test_new_tick_places_an_order_per_tick() {
    let mut live = live("New Tick");
    let mut events = live.scheduler.subscribe();
    live.scheduler.start().await.unwrap();
    assert_eq!(live.scheduler.state(), RunState::Running);

    for s in [10, 20, 70] {
        live.scheduler.on_tick(live.series, tick(s)).await.unwrap();
    }
    assert_eq!(live.broker.orders().await.len(), 3);

    // each fill is reported once as strategy output
    let mut fills = 0;
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::Output(alert) = event {
            assert!(alert.message.contains("EURUSD"));
            fills += 1;
        }
    }
    assert_eq!(fills, 3);

    live.scheduler.stop().await;
    live.scheduler.on_tick(live.series, tick(80)).await.unwrap();
    assert_eq!(live.broker.orders().await.len(), 3);
    assert_eq!(live.scheduler.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_new_bar_trades_on_completed_bars() {
    let mut live = live("New Bar");
    let mut events = live.scheduler.subscribe();
    live.scheduler.start().await.unwrap();

    // one widen, then two rollovers
    for s in [30, 70, 125] {
        live.scheduler.on_tick(live.series, tick(s)).await.unwrap();
    }
    assert_eq!(wait_for_orders(&live.broker, 2).await, 2);

    live.scheduler.stop().await;
    let mut stopped = false;
    while let Ok(event) = events.try_recv() {
        stopped |= matches!(event, SchedulerEvent::Stopped);
    }
    assert!(stopped);
}

#[tokio::test]
async fn test_failed_init_keeps_scheduler_stopped() {
    let aggregator = Arc::new(Aggregator::new(Arc::new(SeriesStore::new())));
    let provider = Arc::new(SimulatedDataProvider::new(Arc::clone(&aggregator)));
    let broker = Arc::new(SimulationBroker::new(dec!(0)).with_account("demo", "sim", dec!(10000)));
    let mut host = SignalHost::new(Box::new(BuyEveryStep), provider, broker).unwrap();
    assert_err!(host.init(Vec::new()));

    let mut scheduler = Scheduler::new(Box::new(host), aggregator);
    assert_eq!(
        scheduler.start().await,
        Err(SchedulerError::Strategy(StrategyError::NotInitialized))
    );
    assert_eq!(scheduler.state(), RunState::Stopped);
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(scheduler.control().alerts().is_empty());
}

#[tokio::test]
async fn test_backtest_is_refused_while_running() {
    let mut live = live("New Tick");
    live.scheduler.start().await.unwrap();
    assert_err!(live.scheduler.backtest().await);
    live.scheduler.on_tick(live.series, tick(70)).await.unwrap();
    live.scheduler.stop().await;

    // seed bar plus the one opened at 10:01, one signal each
    let signals = assert_ok!(live.scheduler.backtest().await);
    assert_eq!(signals.len(), 2);
    assert_eq!(live.scheduler.state(), RunState::Stopped);
}
