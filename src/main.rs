use clap::Parser;
use strategy_sim::cli::{Cli, Commands};
use strategy_sim::config::Config;

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(DEFAULT_CONFIG)?
        }
    };

    // Initialize telemetry
    let telemetry = strategy_sim::telemetry::init_telemetry(&config.telemetry)?;
    tracing::debug!(
        config = %cli.config,
        metrics_port = ?telemetry.metrics_port(),
        instruments = config.instruments.len(),
        "Telemetry ready"
    );

    match cli.command {
        Commands::Backtest(args) => {
            tracing::info!("Starting backtest");
            args.execute(&config).await?;
        }
        Commands::Replay(args) => {
            tracing::info!("Starting replay");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
