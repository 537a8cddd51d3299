//! Backtest command implementation

use super::Workbench;
use crate::backtest::BacktestSummary;
use crate::config::Config;
use crate::strategy::StrategyHost;
use clap::Args;

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Bars per evaluation window (overrides config)
    #[arg(long)]
    pub batch: Option<i64>,

    /// Intrabar price path: OPEN, HIGH, LOW, CLOSE, OHLC or OLHC
    #[arg(long)]
    pub price_element: Option<String>,

    /// Bars of history per instrument, 0 for all
    #[arg(long)]
    pub bars_back: Option<usize>,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl BacktestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        if let Some(batch) = self.batch {
            config.strategy.backtest_batch = batch;
        }
        if let Some(element) = &self.price_element {
            config.strategy.price_element = element.to_uppercase();
        }
        if let Some(bars_back) = self.bars_back {
            config.backtest.bars_back = bars_back;
        }

        let bench = Workbench::build(&config, config.backtest.transaction_costs, false)?;
        let mut host = bench.host(&config)?;
        tracing::info!(
            strategy = %host.name(),
            instruments = bench.selections.len(),
            batch = config.strategy.backtest_batch,
            price_element = %config.strategy.price_element,
            "Running backtest"
        );

        let report = host.backtest().await?;
        let alerts = host.control().alerts().drain();

        let summary = BacktestSummary::from_report(&report)
            .with_balances(bench.initial_balance, bench.total_balance().await);

        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
            _ => {
                println!("{}", summary.format_table());
                for alert in alerts.iter().take(20) {
                    println!("{}", alert);
                }
            }
        }
        Ok(())
    }
}
