//! Strategy hosting
//!
//! A [`StrategyHost`] is what the scheduler and the CLI drive: it is
//! initialised with selections, parameterised, started once per live trigger
//! and asked to backtest. [`SignalHost`] implements the contract around a
//! pluggable [`SignalDetector`].

mod alerts;
mod breakout;
mod host;
mod params;
mod routing;
mod types;

pub use alerts::{Alert, AlertLevel, AlertLog};
pub use breakout::{BreakoutConfig, BreakoutDetector};
pub use host::{DetectContext, HostRouting, HostSettings, SignalDetector, SignalHost};
pub use params::{apply_values, ParameterDescriptor, ParameterError, ParameterKind, ParameterValue};
pub use routing::{place_signals, DirectRouting, OrderRouting};
pub use types::{RunState, StartMethod, StrategyControl, StrategyError};

use crate::market::{Selection, Tick};
use crate::signal::TradeSignal;
use async_trait::async_trait;
use std::time::Duration;

/// Contract between the engine and plugged-in trading logic
#[async_trait]
pub trait StrategyHost: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Bind the strategy to its selections
    fn init(&mut self, selections: Vec<Selection>) -> Result<(), StrategyError>;

    /// Current parameter descriptors
    fn parameters(&self) -> Vec<ParameterDescriptor>;

    /// Apply positional parameter values; all or nothing
    fn set_parameters(&mut self, values: &[ParameterValue]) -> Result<(), StrategyError>;

    /// One live step, optionally triggered by a selection and its new ticks
    async fn start(
        &mut self,
        trigger: Option<&Selection>,
        ticks: Option<&[Tick]>,
    ) -> Result<Vec<TradeSignal>, StrategyError>;

    /// One full backtest pass over `selections` with the given values.
    ///
    /// Empty `values` keeps the current parameters.
    async fn backtest_slot_item(
        &mut self,
        selections: &[Selection],
        values: &[ParameterValue],
    ) -> Result<Vec<TradeSignal>, StrategyError>;

    /// Shared state, progress, readiness and alerts
    fn control(&self) -> StrategyControl;

    fn start_method(&self) -> StartMethod;

    /// Interval between periodic invocations
    fn execution_period(&self) -> Duration;

    fn selections(&self) -> Vec<Selection>;
}
