//! Signal types

use crate::market::Selection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Immediate execution
    Market,
    /// Execute at the given price or better
    Limit,
    /// Becomes a market order once the price is touched
    Stop,
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Market" => Ok(OrderKind::Market),
            "Limit" => Ok(OrderKind::Limit),
            "Stop Market" | "Stop" => Ok(OrderKind::Stop),
            other => Err(format!("unknown order type '{}'", other)),
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    FillOrKill,
    GoodForDay,
    ImmediateOrCancel,
    GoodTilCancelled,
}

impl FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FOK" => Ok(TimeInForce::FillOrKill),
            "GFD" => Ok(TimeInForce::GoodForDay),
            "IOC" => Ok(TimeInForce::ImmediateOrCancel),
            "GTC" => Ok(TimeInForce::GoodTilCancelled),
            other => Err(format!("unknown time in force '{}'", other)),
        }
    }
}

/// A trade signal generated by a strategy.
///
/// Signals carry no random identity so that repeated backtests over the same
/// data compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Instrument the signal refers to
    pub instrument: Selection,
    /// Trade direction
    pub side: Side,
    /// Requested price
    pub price: Decimal,
    /// Requested quantity
    pub quantity: Decimal,
    /// Order kind
    pub kind: OrderKind,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Bar time in backtests, wall clock time in live runs
    pub timestamp: DateTime<Utc>,
    /// Stop-loss distance from the fill price
    pub stop_loss: Option<Decimal>,
    /// Take-profit distance from the fill price
    pub take_profit: Option<Decimal>,
}

impl TradeSignal {
    /// Create a market GTC signal without protective offsets
    pub fn market(
        instrument: Selection,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument,
            side,
            price,
            quantity,
            kind: OrderKind::Market,
            time_in_force: TimeInForce::GoodTilCancelled,
            timestamp,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_kind(mut self, kind: OrderKind, time_in_force: TimeInForce) -> Self {
        self.kind = kind;
        self.time_in_force = time_in_force;
        self
    }

    pub fn with_protection(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }
}
