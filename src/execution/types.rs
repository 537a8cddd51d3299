//! Execution types

use crate::signal::{OrderKind, Side, TimeInForce, TradeSignal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Broker errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Account is not known to the broker
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Decimal),
    /// Market order without price and no processed bar to price it
    #[error("No price available for {0}")]
    NoPrice(String),
    /// Order id not found on the account
    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),
}

/// An order to be placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Order size
    pub quantity: Decimal,
    /// Requested price (zero = use last known price)
    pub price: Decimal,
    /// Order kind
    pub kind: OrderKind,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Stop-loss offset
    pub stop_loss: Option<Decimal>,
    /// Take-profit offset
    pub take_profit: Option<Decimal>,
    /// Keep the order on our side, not visible to the venue
    pub hidden: bool,
    /// Order time (bar time in backtests)
    pub timestamp: DateTime<Utc>,
}

impl From<&TradeSignal> for OrderRequest {
    fn from(signal: &TradeSignal) -> Self {
        Self {
            symbol: signal.instrument.symbol.clone(),
            side: signal.side,
            quantity: signal.quantity,
            price: signal.price,
            kind: signal.kind,
            time_in_force: signal.time_in_force,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            hidden: false,
            timestamp: signal.timestamp,
        }
    }
}

/// An accepted and filled order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Account the order was placed on
    pub account: String,
    /// Instrument symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Filled quantity
    pub quantity: Decimal,
    /// Fill price
    pub price: Decimal,
    pub kind: OrderKind,
    pub time_in_force: TimeInForce,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub hidden: bool,
    /// Fees paid
    pub fees: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
}

/// Changes applied to an existing order's protection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderModification {
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Hide SL/TP from the venue
    pub hidden: bool,
}

/// Net open position of an account in one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub account: String,
    pub symbol: String,
    /// Long positions are `Buy`, short positions `Sell`
    pub side: Side,
    /// Absolute size
    pub quantity: Decimal,
    /// Volume weighted entry price
    pub average_price: Decimal,
    /// Last processed price
    pub last_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

/// Simulation account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account name
    pub name: String,
    /// Data feed the account trades on
    pub data_feed: String,
    /// Cash balance including realised P&L and fees
    pub balance: Decimal,
}

/// Result of placing one step's orders and reading back positions
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Accepted orders, in submission order
    pub orders: Vec<Order>,
    /// Refused requests with the reason
    pub rejections: Vec<(OrderRequest, BrokerError)>,
    /// Open positions of the account after the batch
    pub positions: Vec<Position>,
}
