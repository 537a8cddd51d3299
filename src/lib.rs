//! strategy-sim: market replay and strategy backtesting engine
//!
//! This library provides the core components for:
//! - Incremental tick-to-bar aggregation over a central series store
//! - Intrabar price-path segmentation for backtests
//! - Chronological multi-instrument backtest scanning
//! - Live strategy scheduling (periodic, new bar, new tick)
//! - Strategy host, broker and data provider contracts
//! - Simulation broker and synthetic market data
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod execution;
pub mod market;
pub mod provider;
pub mod scheduler;
pub mod segmentation;
pub mod series;
pub mod signal;
pub mod strategy;
pub mod telemetry;
