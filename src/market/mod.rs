//! Market data model
//!
//! Bars, ticks, timeframes and the selection keys used to query and group
//! per-instrument history.

mod bar;
mod data;
mod tick;

pub use bar::{Bar, PricePoint};
pub use data::MarketData;
pub use tick::{DepthLevel, Tick};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of a "month" bucket in days. Calendar months are not modelled.
pub const MONTH_BUCKET_DAYS: i64 = 30;

/// Unit of a bar timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minute,
    Hour,
    Day,
    Month,
}

/// Bar timeframe: a unit and a multiplier (e.g. 15 x Minute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timeframe {
    pub unit: TimeUnit,
    pub multiplier: u32,
}

impl Timeframe {
    /// Create a timeframe. A zero multiplier is treated as one.
    pub fn new(unit: TimeUnit, multiplier: u32) -> Self {
        Self {
            unit,
            multiplier: multiplier.max(1),
        }
    }

    pub fn minutes(n: u32) -> Self {
        Self::new(TimeUnit::Minute, n)
    }

    pub fn hours(n: u32) -> Self {
        Self::new(TimeUnit::Hour, n)
    }

    pub fn days(n: u32) -> Self {
        Self::new(TimeUnit::Day, n)
    }

    pub fn months(n: u32) -> Self {
        Self::new(TimeUnit::Month, n)
    }

    /// Fixed bucket width of one bar
    pub fn bucket_width(&self) -> Duration {
        let n = i64::from(self.multiplier.max(1));
        match self.unit {
            TimeUnit::Minute => Duration::minutes(n),
            TimeUnit::Hour => Duration::hours(n),
            TimeUnit::Day => Duration::days(n),
            TimeUnit::Month => Duration::days(n * MONTH_BUCKET_DAYS),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            TimeUnit::Minute => "m",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
            TimeUnit::Month => "mo",
        };
        write!(f, "{}{}", self.multiplier, suffix)
    }
}

/// Identity of one stored series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub data_feed: String,
    pub timeframe: Timeframe,
    pub slot: Option<u32>,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, data_feed: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            data_feed: data_feed.into(),
            timeframe,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.data_feed, self.symbol, self.timeframe)?;
        if let Some(slot) = self.slot {
            write!(f, "#{}", slot)?;
        }
        Ok(())
    }
}

/// Query descriptor for bar data.
///
/// Selections are plain values: two selections with the same fields are
/// interchangeable, including as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    /// Instrument symbol
    pub symbol: String,
    /// Data feed name
    pub data_feed: String,
    /// Bar timeframe
    pub timeframe: Timeframe,
    /// Number of most recent bars requested (0 = all)
    pub bar_count: usize,
    /// Inclusive lower time bound
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper time bound
    pub to: Option<DateTime<Utc>>,
    /// Grouping tag used for trade eligibility
    pub slot: Option<u32>,
}

impl Selection {
    pub fn new(symbol: impl Into<String>, data_feed: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            data_feed: data_feed.into(),
            timeframe,
            bar_count: 0,
            from: None,
            to: None,
            slot: None,
        }
    }

    pub fn with_bar_count(mut self, bar_count: usize) -> Self {
        self.bar_count = bar_count;
        self
    }

    pub fn with_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }

    /// True if an explicit time range was requested
    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Key of the series this selection reads from
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            symbol: self.symbol.clone(),
            data_feed: self.data_feed.clone(),
            timeframe: self.timeframe,
            slot: self.slot,
        }
    }

    /// Whether the selection addresses the given series (slot is not compared)
    pub fn reads(&self, key: &SeriesKey) -> bool {
        self.symbol == key.symbol
            && self.data_feed == key.data_feed
            && self.timeframe == key.timeframe
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.data_feed, self.symbol, self.timeframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_bucket_widths() {
        assert_eq!(Timeframe::minutes(15).bucket_width(), Duration::minutes(15));
        assert_eq!(Timeframe::hours(4).bucket_width(), Duration::hours(4));
        assert_eq!(Timeframe::days(1).bucket_width(), Duration::days(1));
        assert_eq!(Timeframe::months(2).bucket_width(), Duration::days(60));
    }

    #[test]
    fn test_zero_multiplier_clamped() {
        let tf = Timeframe::new(TimeUnit::Minute, 0);
        assert_eq!(tf.multiplier, 1);
        assert_eq!(tf.bucket_width(), Duration::minutes(1));
    }

    #[test]
    fn test_timeframe_display() {
        assert_eq!(Timeframe::minutes(5).to_string(), "5m");
        assert_eq!(Timeframe::months(1).to_string(), "1mo");
    }

    #[test]
    fn test_selection_as_map_key() {
        let a = Selection::new("EURUSD", "sim", Timeframe::minutes(1)).with_bar_count(100);
        let b = Selection::new("EURUSD", "sim", Timeframe::minutes(1)).with_bar_count(100);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_selection_reads_ignores_slot() {
        let key = SeriesKey::new("EURUSD", "sim", Timeframe::minutes(1)).with_slot(3);
        let sel = Selection::new("EURUSD", "sim", Timeframe::minutes(1)).with_slot(1);
        assert!(sel.reads(&key));

        let other = Selection::new("EURUSD", "sim", Timeframe::hours(1));
        assert!(!other.reads(&key));
    }

    #[test]
    fn test_series_key_display() {
        let key = SeriesKey::new("EURUSD", "sim", Timeframe::minutes(1)).with_slot(2);
        assert_eq!(key.to_string(), "sim/EURUSD@1m#2");
    }
}
