//! Backtesting module
//!
//! Replays stored history through a strategy: resolves bar data for the
//! requested selections, merges the series chronologically and evaluates one
//! timestamp group at a time.

mod analytics;
mod merge;
mod scanner;

pub use analytics::BacktestSummary;
pub use merge::{GroupMember, TimeGroup, TimeGroupCursor};
pub use scanner::{BacktestScanner, ScanReport};

use crate::market::{MarketData, Selection};
use crate::provider::DataProvider;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Backtest configuration
#[derive(Debug, Clone)]
pub struct BacktestSettings {
    /// Lower time bound for fetched bars
    pub start: Option<DateTime<Utc>>,
    /// Upper time bound, used only when after `start`
    pub end: Option<DateTime<Utc>>,
    /// Overrides each selection's bar count when non-zero
    pub bars_back: usize,
    /// Starting balance of simulation accounts
    pub initial_balance: Decimal,
    /// Fee rate charged per fill
    pub transaction_costs: Decimal,
    /// Pre-fetched bars; when present the data provider is not consulted
    pub bar_data: MarketData,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            bars_back: 0,
            initial_balance: dec!(10000),
            transaction_costs: Decimal::ZERO,
            bar_data: MarketData::new(),
        }
    }
}

impl BacktestSettings {
    pub fn with_bar_data(mut self, bar_data: MarketData) -> Self {
        self.bar_data = bar_data;
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_bars_back(mut self, bars_back: usize) -> Self {
        self.bars_back = bars_back;
        self
    }

    /// Selection as sent to the data provider
    fn request_for(&self, selection: &Selection) -> Selection {
        let mut request = selection.clone();
        if self.bars_back > 0 {
            request.bar_count = self.bars_back;
        }
        if let Some(start) = self.start {
            request.from = Some(start);
        }
        if let Some(end) = self.end {
            if self.start.map_or(true, |start| end > start) {
                request.to = Some(end);
            }
        }
        request
    }

    /// Bars for each selection, in selection order; selections without data
    /// are left out.
    ///
    /// Pre-fetched data is matched by symbol and timeframe.
    pub fn resolve(&self, selections: &[Selection], provider: &dyn DataProvider) -> MarketData {
        let mut data = MarketData::with_capacity(selections.len());

        if !self.bar_data.is_empty() {
            for selection in selections {
                let bars = self
                    .bar_data
                    .iter()
                    .find(|(s, _)| s.symbol == selection.symbol && s.timeframe == selection.timeframe)
                    .map(|(_, bars)| bars.to_vec())
                    .unwrap_or_default();
                if !bars.is_empty() {
                    data.insert(selection.clone(), bars);
                }
            }
            return data;
        }

        for selection in selections {
            let bars = provider.bars(&self.request_for(selection));
            if !bars.is_empty() {
                data.insert(selection.clone(), bars);
            }
        }
        data
    }
}
