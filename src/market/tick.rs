//! Quote ticks with optional depth

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One depth-of-market level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Depth index, 1 = best level below top of book
    pub level: u32,
    pub bid_price: Decimal,
    pub bid_size: Decimal,
    pub ask_price: Decimal,
    pub ask_size: Decimal,
}

/// A single timestamped quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Quote time
    pub timestamp: DateTime<Utc>,
    /// Best bid price
    pub bid: Decimal,
    /// Best ask price
    pub ask: Decimal,
    /// Size available at the bid
    pub bid_size: Decimal,
    /// Size available at the ask
    pub ask_size: Decimal,
    /// Depth levels, ordered by level
    #[serde(default)]
    pub depth: Vec<DepthLevel>,
}

impl Tick {
    /// Create a top-of-book tick with zero sizes
    pub fn new(timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            bid_size: Decimal::ZERO,
            ask_size: Decimal::ZERO,
            depth: vec![],
        }
    }

    pub fn with_sizes(mut self, bid_size: Decimal, ask_size: Decimal) -> Self {
        self.bid_size = bid_size;
        self.ask_size = ask_size;
        self
    }

    pub fn with_depth(mut self, mut depth: Vec<DepthLevel>) -> Self {
        depth.sort_by_key(|l| l.level);
        self.depth = depth;
        self
    }

    /// Mid price, or the populated side if the other is zero
    pub fn price(&self) -> Decimal {
        if self.bid.is_zero() {
            self.ask
        } else if self.ask.is_zero() {
            self.bid
        } else {
            (self.bid + self.ask) / Decimal::TWO
        }
    }

    /// Ask minus bid
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Total size on both sides of the top of book
    pub fn volume(&self) -> Decimal {
        self.bid_size + self.ask_size
    }
}
