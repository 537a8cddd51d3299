//! Data provider contract
//!
//! Read-only access to bars and ticks as a strategy sees it, backed in this
//! crate by the series store.

mod simulated;
pub mod synthetic;

pub use simulated::{SimulatedDataProvider, SYNTHETIC_SPREAD_PCT};
pub use synthetic::{SyntheticParams, SyntheticSeries};

use crate::market::{Bar, MarketData, Selection, Tick};
use chrono::{DateTime, Utc};

/// Price data source consumed by strategies
pub trait DataProvider: Send + Sync {
    /// Bars for a selection, most recent last, trimmed to the requested count
    fn bars(&self, selection: &Selection) -> Vec<Bar>;

    /// Bars with timestamps inside `[from, to]`.
    ///
    /// Falls back to [`DataProvider::bars`] when neither bound is given; a
    /// `to` at or before `from` leaves the upper end open.
    fn bars_between(
        &self,
        selection: &Selection,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<Bar>;

    /// Most recent tick seen for an instrument
    fn last_tick(&self, data_feed: &str, symbol: &str) -> Option<Tick>;

    /// Tick at a point in time, synthesised from bars when no tick matches
    fn tick(&self, data_feed: &str, symbol: &str, timestamp: DateTime<Utc>) -> Option<Tick>;

    fn data_feeds(&self) -> Vec<String>;

    fn symbols(&self, data_feed: &str) -> Vec<String>;

    /// Fetch bars for several selections, preserving their order
    fn market_data(&self, selections: &[Selection]) -> MarketData {
        selections
            .iter()
            .map(|s| (s.clone(), self.bars(s)))
            .collect()
    }
}
