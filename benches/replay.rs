//! Benchmarks for intrabar segmentation and backtest scans

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use std::sync::Arc;
use strategy_sim::backtest::BacktestScanner;
use strategy_sim::execution::SimulationBroker;
use strategy_sim::market::{MarketData, Selection, Timeframe};
use strategy_sim::provider::{synthetic, SimulatedDataProvider, SyntheticParams};
use strategy_sim::segmentation::{segment, PriceMode};
use strategy_sim::series::{Aggregator, SeriesStore};
use strategy_sim::strategy::{DirectRouting, RunState, StrategyControl};

fn params(symbol: &str, bars: usize) -> SyntheticParams {
    SyntheticParams {
        symbol: symbol.to_string(),
        data_feed: "sim".to_string(),
        timeframe: Timeframe::minutes(1),
        bars,
        ticks: 0,
        depth_levels: 0,
        price_min: dec!(1.05),
        price_max: dec!(1.15),
        slot: None,
        seed: 42,
    }
}

fn benchmark_segmentation(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let series = synthetic::generate(&params("EURUSD", 30), start);
    let mut data = MarketData::new();
    data.insert(
        Selection::new("EURUSD", "sim", Timeframe::minutes(1)),
        series.bars,
    );

    c.bench_function("segment_ohlc", |b| {
        b.iter(|| segment(black_box(PriceMode::Ohlc), black_box(&data)))
    });
}

fn benchmark_scan(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let provider = SimulatedDataProvider::new(Arc::new(Aggregator::new(Arc::new(SeriesStore::new()))));
    let mut selections = Vec::new();
    for symbol in ["EURUSD", "GBPUSD", "USDJPY"] {
        provider
            .load(synthetic::generate(&params(symbol, 2_000), start))
            .unwrap();
        selections.push(Selection::new(symbol, "sim", Timeframe::minutes(1)));
    }
    let broker = SimulationBroker::new(dec!(0));
    let control = StrategyControl::new();
    control.set_state(RunState::Backtesting);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("scan_3x2000_batch_10", |b| {
        b.to_async(&runtime).iter(|| async {
            BacktestScanner::new(&provider, &broker, &DirectRouting, &control)
                .with_segmentation(PriceMode::Olhc)
                .run(&selections, 10, |data| {
                    black_box(data);
                    Ok(Vec::new())
                })
                .await
        })
    });
}

criterion_group!(benches, benchmark_segmentation, benchmark_scan);
criterion_main!(benches);
