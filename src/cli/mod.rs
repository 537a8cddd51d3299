//! CLI interface for strategy-sim
//!
//! Provides subcommands for:
//! - `backtest`: Backtest the breakout strategy on synthetic history
//! - `replay`: Stream synthetic ticks through the live scheduler
//! - `config`: Show the loaded configuration

mod backtest;
mod replay;

pub use backtest::BacktestArgs;
pub use replay::ReplayArgs;

use crate::config::Config;
use crate::execution::{Broker, SimulationBroker};
use crate::market::{Selection, Tick};
use crate::provider::{synthetic, SimulatedDataProvider};
use crate::series::{Aggregator, SeriesId, SeriesStore};
use crate::strategy::{BreakoutDetector, SignalHost, StrategyHost};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "strategy-sim")]
#[command(about = "Bar aggregation, live scheduling and backtesting of trading strategies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Backtest on synthetic history
    Backtest(BacktestArgs),
    /// Replay synthetic ticks through the live scheduler
    Replay(ReplayArgs),
    /// Show configuration
    Config,
}

/// Series, provider and broker built from the configured instruments
struct Workbench {
    aggregator: Arc<Aggregator>,
    provider: Arc<SimulatedDataProvider>,
    broker: Arc<SimulationBroker>,
    selections: Vec<Selection>,
    /// Generated ticks not yet appended, in time order
    pending_ticks: Vec<(SeriesId, Tick)>,
    initial_balance: Decimal,
}

impl Workbench {
    /// Generate every instrument.
    ///
    /// With `hold_ticks` the generated ticks are kept back for replay instead
    /// of being stored with their series.
    fn build(config: &Config, fee_rate: Decimal, hold_ticks: bool) -> anyhow::Result<Self> {
        if config.instruments.is_empty() {
            anyhow::bail!("No instruments configured");
        }

        let aggregator = Arc::new(Aggregator::new(Arc::new(SeriesStore::new())));
        let provider = Arc::new(SimulatedDataProvider::new(Arc::clone(&aggregator)));

        let mut selections = Vec::with_capacity(config.instruments.len());
        let mut pending_ticks = Vec::new();
        for params in &config.instruments {
            let series = synthetic::generate(params, config.engine.history_start);
            tracing::info!(
                series = %series.key,
                bars = series.bars.len(),
                ticks = series.ticks.len(),
                "Generated synthetic series"
            );

            let mut selection = Selection::new(&params.symbol, &params.data_feed, params.timeframe);
            if let Some(slot) = params.slot {
                selection = selection.with_slot(slot);
            }
            selections.push(selection);

            if hold_ticks {
                let id = provider.store().register(series.key, series.bars)?;
                pending_ticks.extend(series.ticks.into_iter().map(|t| (id, t)));
            } else {
                provider.load(series)?;
            }
        }
        pending_ticks.sort_by_key(|(_, tick)| tick.timestamp);

        let mut broker = SimulationBroker::new(fee_rate);
        let mut initial_balance = Decimal::ZERO;
        if config.accounts.is_empty() {
            broker = broker.with_account("demo", "sim", config.backtest.initial_balance);
            initial_balance = config.backtest.initial_balance;
        }
        for account in &config.accounts {
            let balance = account.balance.unwrap_or(config.backtest.initial_balance);
            broker = broker.with_account(&account.name, &account.data_feed, balance);
            initial_balance += balance;
        }

        Ok(Self {
            aggregator,
            provider,
            broker: Arc::new(broker),
            selections,
            pending_ticks,
            initial_balance,
        })
    }

    /// Breakout strategy host, parameterised and initialised
    fn host(&self, config: &Config) -> anyhow::Result<SignalHost> {
        let detector = BreakoutDetector::new(config.strategy.breakout());
        let mut host = SignalHost::new(
            Box::new(detector),
            self.provider.clone(),
            self.broker.clone(),
        )?
        .with_backtest_settings(config.backtest.settings());
        host.set_parameters(&config.strategy.parameter_values())?;
        host.init(self.selections.clone())?;
        Ok(host)
    }

    /// Sum of all account balances
    async fn total_balance(&self) -> Decimal {
        let mut total = Decimal::ZERO;
        for name in self.broker.accounts().await {
            if let Some(account) = self.broker.account(&name).await {
                total += account.balance;
            }
        }
        total
    }
}
