//! Scheduler types

use crate::strategy::{Alert, RunState, StrategyError};
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Requested transition is not allowed from the current state
    #[error("Strategy is {0}")]
    Busy(RunState),
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Observable scheduler activity
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// Informational strategy output
    Output(Alert),
    /// A caught failure
    Alert(Alert),
    /// Backtest progress in percent
    BacktestProgress(u8),
    /// Backtest reached 100%
    BacktestFinished,
    /// Live mode was stopped
    Stopped,
}
