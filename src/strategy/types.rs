//! Strategy types

use super::{AlertLog, ParameterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Strategy errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    /// Invalid parameters or selections; the run must not start
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Trading logic failed during one invocation
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
    /// `start` or a backtest was requested before `init`
    #[error("Strategy not initialized")]
    NotInitialized,
}

impl From<ParameterError> for StrategyError {
    fn from(e: ParameterError) -> Self {
        StrategyError::Configuration(e.to_string())
    }
}

/// Run state of a strategy.
///
/// `Running` and `Backtesting` are mutually exclusive; both return to `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Backtesting,
}

impl RunState {
    fn to_u8(self) -> u8 {
        match self {
            RunState::Stopped => 0,
            RunState::Running => 1,
            RunState::Backtesting => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Running,
            2 => RunState::Backtesting,
            _ => RunState::Stopped,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Stopped => write!(f, "stopped"),
            RunState::Running => write!(f, "running"),
            RunState::Backtesting => write!(f, "backtesting"),
        }
    }
}

/// What triggers a live strategy invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMethod {
    /// Timer with a fixed execution period
    #[default]
    Periodic,
    /// Bar completion on a subscribed series
    NewBar,
    /// Every tick on a subscribed series
    NewTick,
}

/// Shared, lock-free view of a strategy's state.
///
/// Cloned handles observe the same state, so a scheduler can cancel a
/// backtest or poll its progress while the strategy itself is busy.
#[derive(Debug, Clone, Default)]
pub struct StrategyControl {
    state: Arc<AtomicU8>,
    progress: Arc<AtomicU8>,
    ready: Arc<AtomicBool>,
    alerts: Arc<AlertLog>,
}

impl StrategyControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: RunState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Move to `to` only if currently in `from`
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Backtest progress in percent
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    pub fn set_progress(&self, pct: u8) {
        self.progress.store(pct.min(100), Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn alerts(&self) -> &Arc<AlertLog> {
        &self.alerts
    }
}
