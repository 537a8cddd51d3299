//! End-to-end integration tests

use std::sync::Arc;
use strategy_sim::backtest::BacktestSummary;
use strategy_sim::cli::BacktestArgs;
use strategy_sim::config::Config;
use strategy_sim::execution::SimulationBroker;
use strategy_sim::market::Selection;
use strategy_sim::provider::{synthetic, SimulatedDataProvider};
use strategy_sim::series::{Aggregator, SeriesStore};
use strategy_sim::strategy::{BreakoutDetector, SignalHost, StrategyHost};

const EXAMPLE_CONFIG: &str = include_str!("../../config.toml.example");

#[test]
fn test_example_config_parses() {
    let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
    assert_eq!(config.instruments.len(), 2);
    assert_eq!(config.accounts[0].name, "demo");
    assert_eq!(config.strategy.start_event, "New Bar");
    assert_eq!(config.strategy.parameter_values().len(), 15);
}

#[tokio::test]
async fn test_backtest_from_example_config() {
    let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();

    let aggregator = Arc::new(Aggregator::new(Arc::new(SeriesStore::new())));
    let provider = Arc::new(SimulatedDataProvider::new(aggregator));
    let mut selections = Vec::new();
    for params in &config.instruments {
        provider
            .load(synthetic::generate(params, config.engine.history_start))
            .unwrap();
        let selection = Selection::new(&params.symbol, &params.data_feed, params.timeframe);
        selections.push(match params.slot {
            Some(slot) => selection.with_slot(slot),
            None => selection,
        });
    }

    let mut broker = SimulationBroker::new(config.backtest.transaction_costs);
    for account in &config.accounts {
        broker = broker.with_account(
            &account.name,
            &account.data_feed,
            account.balance.unwrap_or(config.backtest.initial_balance),
        );
    }
    let broker = Arc::new(broker);

    let mut host = SignalHost::new(
        Box::new(BreakoutDetector::new(config.strategy.breakout())),
        provider,
        broker.clone(),
    )
    .unwrap()
    .with_backtest_settings(config.backtest.settings());
    host.set_parameters(&config.strategy.parameter_values()).unwrap();
    host.init(selections).unwrap();

    let report = host.backtest().await.unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.instruments, 2);
    // 500 one-minute EURUSD bars; the first 100 GBPUSD bars share their
    // timestamps, the other 100 start groups of their own
    assert_eq!(report.iterations, 600);
    assert_eq!(host.control().progress(), 100);

    let orders = broker.orders().await;
    assert!(orders.len() <= report.signals.len());

    let summary = BacktestSummary::from_report(&report);
    assert_eq!(summary.total_signals, report.signals.len());
    assert_eq!(summary.buys + summary.sells, summary.total_signals);
    assert!(summary.format_table().contains("Trade Signals:"));
}

#[tokio::test]
async fn test_backtest_command_prints_json() {
    let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
    let args = BacktestArgs {
        batch: Some(3),
        price_element: Some("ohlc".to_string()),
        bars_back: Some(100),
        format: "json".to_string(),
    };
    args.execute(&config).await.unwrap();
}
