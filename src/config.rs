//! Configuration types for strategy-sim

use crate::backtest::BacktestSettings;
use crate::provider::SyntheticParams;
use crate::strategy::{BreakoutConfig, ParameterValue};
use crate::telemetry::LogFormat;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Synthetic instruments loaded into the series store
    #[serde(default, rename = "instrument")]
    pub instruments: Vec<SyntheticParams>,
    /// Simulation broker accounts
    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountConfig>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Time of the first generated bar
    #[serde(default = "default_history_start")]
    pub history_start: DateTime<Utc>,
    /// Broker fee per unit of notional
    #[serde(default)]
    pub fee_rate: Decimal,
    /// Pause between replayed ticks
    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,
}

fn default_history_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
fn default_replay_interval_ms() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_start: default_history_start(),
            fee_rate: Decimal::ZERO,
            replay_interval_ms: default_replay_interval_ms(),
        }
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Overrides each selection's bar count when non-zero
    #[serde(default)]
    pub bars_back: usize,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    #[serde(default)]
    pub transaction_costs: Decimal,
}

fn default_initial_balance() -> Decimal {
    Decimal::new(10000, 0)
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            bars_back: 0,
            initial_balance: default_initial_balance(),
            transaction_costs: Decimal::ZERO,
        }
    }
}

impl BacktestConfig {
    pub fn settings(&self) -> BacktestSettings {
        BacktestSettings {
            start: self.start,
            end: self.end,
            bars_back: self.bars_back,
            initial_balance: self.initial_balance,
            transaction_costs: self.transaction_costs,
            ..BacktestSettings::default()
        }
    }
}

/// Strategy host parameters and detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// "New Bar", "New Tick" or "Periodical"
    #[serde(default = "default_start_event")]
    pub start_event: String,
    #[serde(default = "default_period_ms")]
    pub period_ms: i64,
    #[serde(default = "default_trade_slot")]
    pub trade_slot: i64,
    /// "Market", "Limit" or "Stop Market"
    #[serde(default = "default_order_type")]
    pub order_type: String,
    #[serde(default = "default_tif")]
    pub time_in_force: String,
    #[serde(default)]
    pub hide_order: bool,
    /// OPEN, HIGH, LOW, CLOSE, OHLC or OLHC
    #[serde(default = "default_price_element")]
    pub price_element: String,
    #[serde(default)]
    pub hide_stop_loss: bool,
    #[serde(default)]
    pub hide_take_profit: bool,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// Offsets are in points of 0.00001
    #[serde(default = "default_price_offset")]
    pub sell_price_offset: i64,
    #[serde(default = "default_price_offset")]
    pub buy_price_offset: i64,
    #[serde(default)]
    pub stop_loss_offset: i64,
    #[serde(default)]
    pub take_profit_offset: i64,
    #[serde(default = "default_batch")]
    pub backtest_batch: i64,

    #[serde(default = "default_ma_period")]
    pub ma_period: usize,
    #[serde(default = "default_bands_period")]
    pub bands_period: usize,
    #[serde(default = "default_deviation")]
    pub deviation: Decimal,
}

fn default_start_event() -> String {
    "Periodical".to_string()
}
fn default_period_ms() -> i64 {
    5000
}
fn default_trade_slot() -> i64 {
    1
}
fn default_order_type() -> String {
    "Market".to_string()
}
fn default_tif() -> String {
    "FOK".to_string()
}
fn default_price_element() -> String {
    "CLOSE".to_string()
}
fn default_quantity() -> i64 {
    1
}
fn default_price_offset() -> i64 {
    50
}
fn default_batch() -> i64 {
    1
}
fn default_ma_period() -> usize {
    9
}
fn default_bands_period() -> usize {
    28
}
fn default_deviation() -> Decimal {
    Decimal::new(2, 0)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            start_event: default_start_event(),
            period_ms: default_period_ms(),
            trade_slot: default_trade_slot(),
            order_type: default_order_type(),
            time_in_force: default_tif(),
            hide_order: false,
            price_element: default_price_element(),
            hide_stop_loss: false,
            hide_take_profit: false,
            quantity: default_quantity(),
            sell_price_offset: default_price_offset(),
            buy_price_offset: default_price_offset(),
            stop_loss_offset: 0,
            take_profit_offset: 0,
            backtest_batch: default_batch(),
            ma_period: default_ma_period(),
            bands_period: default_bands_period(),
            deviation: default_deviation(),
        }
    }
}

impl StrategyConfig {
    /// Positional values for the signal host's parameter list
    pub fn parameter_values(&self) -> Vec<ParameterValue> {
        let on_off = |flag: bool| ParameterValue::Text(if flag { "ON" } else { "OFF" }.to_string());
        vec![
            ParameterValue::Text(self.start_event.clone()),
            ParameterValue::Int(self.period_ms),
            ParameterValue::Int(self.trade_slot),
            ParameterValue::Text(self.order_type.clone()),
            ParameterValue::Text(self.time_in_force.clone()),
            on_off(self.hide_order),
            ParameterValue::Text(self.price_element.clone()),
            on_off(self.hide_stop_loss),
            on_off(self.hide_take_profit),
            ParameterValue::Int(self.quantity),
            ParameterValue::Int(self.sell_price_offset),
            ParameterValue::Int(self.buy_price_offset),
            ParameterValue::Int(self.stop_loss_offset),
            ParameterValue::Int(self.take_profit_offset),
            ParameterValue::Int(self.backtest_batch),
        ]
    }

    pub fn breakout(&self) -> BreakoutConfig {
        BreakoutConfig {
            ma_period: self.ma_period,
            bands_period: self.bands_period,
            deviation: self.deviation,
            ..BreakoutConfig::default()
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port; no exporter when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

/// Simulation broker account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default = "default_data_feed")]
    pub data_feed: String,
    /// Starting balance; the backtest initial balance when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
}

fn default_data_feed() -> String {
    "sim".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
