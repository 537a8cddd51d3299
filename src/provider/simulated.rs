//! Data provider over the in-memory series store

use super::{DataProvider, SyntheticSeries};
use crate::market::{Bar, Selection, Tick};
use crate::series::{Aggregator, SeriesError, SeriesId, SeriesStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Half-spread applied around the mean close when a tick is synthesised from a bar
pub const SYNTHETIC_SPREAD_PCT: Decimal = dec!(0.05);

/// Serves bars and ticks held by a [`SeriesStore`], with last ticks taken
/// from the [`Aggregator`]'s cache
pub struct SimulatedDataProvider {
    store: Arc<SeriesStore>,
    aggregator: Arc<Aggregator>,
}

impl SimulatedDataProvider {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            store: Arc::clone(aggregator.store()),
            aggregator,
        }
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    /// Register a generated series (bars and ticks)
    pub fn load(&self, series: SyntheticSeries) -> Result<SeriesId, SeriesError> {
        let id = self.store.register(series.key, series.bars)?;
        self.store.load_ticks(id, series.ticks)?;
        Ok(id)
    }

    fn snapshot(&self, selection: &Selection) -> Vec<Bar> {
        self.store
            .find(selection)
            .and_then(|id| self.store.bars(id).ok())
            .unwrap_or_default()
    }
}

fn within(bars: Vec<Bar>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<Bar> {
    let to = match (from, to) {
        (Some(f), Some(t)) if t <= f => None,
        _ => to,
    };
    bars.into_iter()
        .filter(|b| from.map_or(true, |f| b.timestamp >= f) && to.map_or(true, |t| b.timestamp <= t))
        .collect()
}

fn trim(mut bars: Vec<Bar>, count: usize) -> Vec<Bar> {
    if count > 0 && bars.len() > count {
        bars.drain(..bars.len() - count);
    }
    bars
}

impl DataProvider for SimulatedDataProvider {
    fn bars(&self, selection: &Selection) -> Vec<Bar> {
        let bars = self.snapshot(selection);
        let bars = if selection.has_range() {
            within(bars, selection.from, selection.to)
        } else {
            bars
        };
        trim(bars, selection.bar_count)
    }

    fn bars_between(
        &self,
        selection: &Selection,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<Bar> {
        if from.is_none() && to.is_none() {
            return self.bars(selection);
        }
        within(self.snapshot(selection), from, to)
    }

    fn last_tick(&self, data_feed: &str, symbol: &str) -> Option<Tick> {
        if let Some(tick) = self.aggregator.last_tick_for(data_feed, symbol) {
            return Some(tick);
        }
        self.store
            .ids_for(data_feed, symbol)
            .into_iter()
            .filter_map(|id| self.store.with_series(id, |s| s.ticks().last().cloned()).ok().flatten())
            .max_by_key(|t| t.timestamp)
    }

    fn tick(&self, data_feed: &str, symbol: &str, timestamp: DateTime<Utc>) -> Option<Tick> {
        let ids = self.store.ids_for(data_feed, symbol);

        let exact = ids.iter().find_map(|&id| {
            self.store
                .with_series(id, |s| s.tick_at(timestamp).cloned())
                .ok()
                .flatten()
        });
        if exact.is_some() {
            return exact;
        }

        if let Some(last) = self.last_tick(data_feed, symbol) {
            if last.timestamp <= timestamp {
                return Some(last);
            }
        }

        // smallest timeframe first
        let bar = ids.first().and_then(|&id| {
            self.store
                .with_series(id, |s| s.nearest_bar(timestamp).cloned())
                .ok()
                .flatten()
        })?;

        let mid = bar.mean_close();
        let offset = mid * SYNTHETIC_SPREAD_PCT;
        tracing::trace!(data_feed, symbol, %mid, "Synthesised tick from bar");
        Some(Tick::new(timestamp, mid - offset, mid + offset))
    }

    fn data_feeds(&self) -> Vec<String> {
        self.store.data_feeds()
    }

    fn symbols(&self, data_feed: &str) -> Vec<String> {
        self.store.symbols(data_feed)
    }
}
