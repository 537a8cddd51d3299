//! Replay command implementation

use super::Workbench;
use crate::config::Config;
use crate::scheduler::{Scheduler, SchedulerEvent};
use crate::strategy::StrategyHost;
use clap::Args;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<usize>,

    /// Pause between ticks in ms (overrides config)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Start event: "New Bar", "New Tick" or "Periodical" (overrides config)
    #[arg(long)]
    pub start_event: Option<String>,
}

impl ReplayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        if let Some(event) = &self.start_event {
            config.strategy.start_event = event.clone();
        }
        let interval = Duration::from_millis(self.interval_ms.unwrap_or(config.engine.replay_interval_ms));

        let bench = Workbench::build(&config, config.engine.fee_rate, true)?;
        let host = bench.host(&config)?;
        tracing::info!(strategy = %host.name(), start_method = ?host.start_method(), "Starting replay");

        let mut scheduler = Scheduler::new(Box::new(host), bench.aggregator.clone());
        let mut events = scheduler.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SchedulerEvent::Stopped) | Err(RecvError::Closed) => break,
                    Ok(SchedulerEvent::Output(alert)) | Ok(SchedulerEvent::Alert(alert)) => {
                        println!("{}", alert)
                    }
                    Ok(other) => tracing::debug!(event = ?other, "Scheduler event"),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event printer lagged")
                    }
                }
            }
        });

        scheduler.start().await?;

        let limit = self.max_ticks.unwrap_or(usize::MAX);
        let mut replayed = 0usize;
        let mut bars_opened = 0usize;
        for (id, tick) in bench.pending_ticks.iter().take(limit) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
                outcome = scheduler.on_tick(*id, tick.clone()) => {
                    if outcome?.opened_bar() {
                        bars_opened += 1;
                    }
                    replayed += 1;
                }
            }
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        scheduler.stop().await;
        let _ = printer.await;

        let orders = bench.broker.orders().await;
        println!(
            "Replayed {} ticks, {} bars completed, {} orders placed, balance {:.2}",
            replayed,
            bars_opened,
            orders.len(),
            bench.total_balance().await
        );
        Ok(())
    }
}
