//! Bid/ask OHLCV bars

use super::Tick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One of the four price points of a bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricePoint {
    Open,
    High,
    Low,
    Close,
}

/// Mean of a bid/ask pair, falling back to the populated side
fn mean(bid: Decimal, ask: Decimal) -> Decimal {
    if bid.is_zero() {
        ask
    } else if ask.is_zero() {
        bid
    } else {
        (bid + ask) / Decimal::TWO
    }
}

/// OHLC summary of one time bucket, tracked separately for bid and ask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start time
    pub timestamp: DateTime<Utc>,
    pub open_bid: Decimal,
    pub open_ask: Decimal,
    pub high_bid: Decimal,
    pub high_ask: Decimal,
    pub low_bid: Decimal,
    pub low_ask: Decimal,
    pub close_bid: Decimal,
    pub close_ask: Decimal,
    pub volume_bid: Decimal,
    pub volume_ask: Decimal,
}

impl Bar {
    /// Create a bar whose open/high/low/close all equal the given bid/ask
    pub fn flat(timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            timestamp,
            open_bid: bid,
            open_ask: ask,
            high_bid: bid,
            high_ask: ask,
            low_bid: bid,
            low_ask: ask,
            close_bid: bid,
            close_ask: ask,
            volume_bid: Decimal::ZERO,
            volume_ask: Decimal::ZERO,
        }
    }

    /// Open a new bar at `timestamp` from a single tick
    pub fn from_tick(timestamp: DateTime<Utc>, tick: &Tick) -> Self {
        Self {
            volume_bid: tick.bid_size,
            volume_ask: tick.ask_size,
            ..Self::flat(timestamp, tick.bid, tick.ask)
        }
    }

    /// Fold a tick into this bar: widen high/low, move close, add volume
    pub fn widen(&mut self, tick: &Tick) {
        self.high_bid = self.high_bid.max(tick.bid);
        self.high_ask = self.high_ask.max(tick.ask);
        self.low_bid = self.low_bid.min(tick.bid);
        self.low_ask = self.low_ask.min(tick.ask);
        self.close_bid = tick.bid;
        self.close_ask = tick.ask;
        self.volume_bid += tick.bid_size;
        self.volume_ask += tick.ask_size;
    }

    /// (bid, ask) pair for a price point
    pub fn price(&self, point: PricePoint) -> (Decimal, Decimal) {
        match point {
            PricePoint::Open => (self.open_bid, self.open_ask),
            PricePoint::High => (self.high_bid, self.high_ask),
            PricePoint::Low => (self.low_bid, self.low_ask),
            PricePoint::Close => (self.close_bid, self.close_ask),
        }
    }

    pub fn mean_open(&self) -> Decimal {
        mean(self.open_bid, self.open_ask)
    }

    pub fn mean_high(&self) -> Decimal {
        mean(self.high_bid, self.high_ask)
    }

    pub fn mean_low(&self) -> Decimal {
        mean(self.low_bid, self.low_ask)
    }

    pub fn mean_close(&self) -> Decimal {
        mean(self.close_bid, self.close_ask)
    }

    pub fn mean_volume(&self) -> Decimal {
        mean(self.volume_bid, self.volume_ask)
    }

    /// Mean price at a price point
    pub fn mean_price(&self, point: PricePoint) -> Decimal {
        let (bid, ask) = self.price(point);
        mean(bid, ask)
    }

    /// True if any bid price field is non-zero
    pub fn has_bid_side(&self) -> bool {
        !(self.open_bid.is_zero()
            && self.high_bid.is_zero()
            && self.low_bid.is_zero()
            && self.close_bid.is_zero())
    }

    /// True if any ask price field is non-zero
    pub fn has_ask_side(&self) -> bool {
        !(self.open_ask.is_zero()
            && self.high_ask.is_zero()
            && self.low_ask.is_zero()
            && self.close_ask.is_zero())
    }

    /// Checks high >= max(open, close) >= min(open, close) >= low on every populated side
    pub fn is_consistent(&self) -> bool {
        let side_ok = |open: Decimal, high: Decimal, low: Decimal, close: Decimal| {
            high >= open.max(close) && open.min(close) >= low
        };

        (!self.has_bid_side() || side_ok(self.open_bid, self.high_bid, self.low_bid, self.close_bid))
            && (!self.has_ask_side()
                || side_ok(self.open_ask, self.high_ask, self.low_ask, self.close_ask))
    }
}
