//! Trade signals
//!
//! Produced by strategies, consumed by order placement

mod types;

pub use types::{OrderKind, Side, TimeInForce, TradeSignal};
