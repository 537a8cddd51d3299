//! Data provider over generated series

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use strategy_sim::market::{Bar, Selection, SeriesKey, Timeframe};
use strategy_sim::provider::{synthetic, DataProvider, SimulatedDataProvider, SyntheticParams};
use strategy_sim::series::{Aggregator, SeriesStore};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn provider() -> SimulatedDataProvider {
    SimulatedDataProvider::new(Arc::new(Aggregator::new(Arc::new(SeriesStore::new()))))
}

fn params() -> SyntheticParams {
    SyntheticParams {
        symbol: "EURUSD".to_string(),
        data_feed: "sim".to_string(),
        timeframe: Timeframe::minutes(1),
        bars: 120,
        ticks: 0,
        depth_levels: 0,
        price_min: dec!(1.05),
        price_max: dec!(1.15),
        slot: None,
        seed: 3,
    }
}

#[test]
fn test_synthesised_tick_from_bar() {
    let provider = provider();
    provider
        .store()
        .register(
            SeriesKey::new("EURUSD", "sim", Timeframe::minutes(1)),
            vec![Bar::flat(start(), dec!(1.2000), dec!(1.2000))],
        )
        .unwrap();

    let tick = provider
        .tick("sim", "EURUSD", start() + Duration::seconds(30))
        .unwrap();
    assert_eq!(tick.bid, dec!(1.1400));
    assert_eq!(tick.ask, dec!(1.2600));
}

#[test]
fn test_generated_history_is_served_in_order() {
    let provider = provider();
    provider.load(synthetic::generate(&params(), start())).unwrap();

    let selection = Selection::new("EURUSD", "sim", Timeframe::minutes(1)).with_bar_count(50);
    let bars = provider.bars(&selection);
    assert_eq!(bars.len(), 50);
    assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(bars[49].timestamp, start() + Duration::minutes(119));

    let between = provider.bars_between(
        &selection,
        Some(start() + Duration::minutes(10)),
        Some(start() + Duration::minutes(19)),
    );
    assert_eq!(between.len(), 10);

    assert_eq!(provider.data_feeds(), vec!["sim".to_string()]);
    assert_eq!(provider.symbols("sim"), vec!["EURUSD".to_string()]);
}

#[test]
fn test_unknown_instrument() {
    let provider = provider();
    let selection = Selection::new("XAUUSD", "sim", Timeframe::hours(1));
    assert!(provider.bars(&selection).is_empty());
    assert!(provider.last_tick("sim", "XAUUSD").is_none());
    assert!(provider.tick("sim", "XAUUSD", start()).is_none());
}
