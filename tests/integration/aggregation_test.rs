//! Aggregator behaviour through the public API

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use strategy_sim::market::{Bar, SeriesKey, Tick, Timeframe};
use strategy_sim::series::{Aggregator, AppendOutcome, SeriesError, SeriesStore};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

fn key() -> SeriesKey {
    SeriesKey::new("EURUSD", "sim", Timeframe::minutes(1))
}

#[test]
fn test_widen_then_roll_over() {
    let store = Arc::new(SeriesStore::new());
    let id = store
        .register(key(), vec![Bar::flat(at(10, 0, 0), dec!(1.1000), dec!(1.1000))])
        .unwrap();
    let aggregator = Aggregator::new(Arc::clone(&store));

    let outcome = aggregator
        .append_tick(id, &Tick::new(at(10, 0, 30), dec!(1.1005), dec!(1.1005)))
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Widened);
    let bars = store.bars(id).unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].high_bid, dec!(1.1005));
    assert_eq!(bars[0].close_bid, dec!(1.1005));
    assert_eq!(bars[0].open_bid, dec!(1.1000));

    let outcome = aggregator
        .append_tick(id, &Tick::new(at(10, 1, 5), dec!(1.1010), dec!(1.1010)))
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Opened(at(10, 1, 0)));

    let bars = store.bars(id).unwrap();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].close_bid, dec!(1.1005));
    assert_eq!(bars[1].timestamp, at(10, 1, 0));
    assert_eq!(bars[1].open_bid, dec!(1.1010));
    assert_eq!(bars[1].high_bid, dec!(1.1010));
    assert_eq!(bars[1].low_bid, dec!(1.1010));
    assert_eq!(bars[1].close_bid, dec!(1.1010));
}

#[test]
fn test_append_without_seed_bar_fails() {
    let store = Arc::new(SeriesStore::new());
    let id = store.register(key(), Vec::new()).unwrap();
    let aggregator = Aggregator::new(store);

    let err = aggregator
        .append_tick(id, &Tick::new(at(10, 0, 0), dec!(1.1), dec!(1.1)))
        .unwrap_err();
    assert_eq!(err, SeriesError::InvalidState(key()));
}

proptest! {
    #[test]
    fn prop_bar_count_and_bounds(
        steps in prop::collection::vec((1i64..60, 1000i64..2000), 1..200)
    ) {
        let width = Duration::minutes(1);
        let start = at(0, 0, 0);
        let seed = dec!(1.5);

        let store = Arc::new(SeriesStore::new());
        let id = store.register(key(), vec![Bar::flat(start, seed, seed)]).unwrap();
        let aggregator = Aggregator::new(Arc::clone(&store));

        let mut ticks = Vec::with_capacity(steps.len());
        let mut time = start;
        for (gap, milli) in &steps {
            time += Duration::seconds(*gap);
            let price = Decimal::new(*milli, 3);
            let tick = Tick::new(time, price, price);
            aggregator.append_tick(id, &tick).unwrap();
            ticks.push(tick);
        }

        let bars = store.bars(id).unwrap();
        let elapsed = time - start;
        let expected = (elapsed.num_seconds() / width.num_seconds()) as usize;
        prop_assert_eq!(bars.len() - 1, expected);

        for bar in &bars {
            let end = bar.timestamp + width;
            for tick in ticks.iter().filter(|t| t.timestamp >= bar.timestamp && t.timestamp < end) {
                prop_assert!(bar.high_bid >= tick.bid && bar.low_bid <= tick.bid);
                prop_assert!(bar.high_ask >= tick.ask && bar.low_ask <= tick.ask);
            }
        }
    }
}
