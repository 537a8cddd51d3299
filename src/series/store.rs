//! Central owner of per-instrument history
//!
//! Every series lives behind its own mutex so a tick append locks one
//! instrument only. Readers take snapshots and never hold a lock while
//! running a strategy.

use super::{SeriesError, SeriesId};
use crate::market::{Bar, SeriesKey, Selection, Tick};
use crate::telemetry::{self, GaugeMetric};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Ordered bars and ticks of one instrument/timeframe
#[derive(Debug, Clone)]
pub struct Series {
    key: SeriesKey,
    bars: Vec<Bar>,
    ticks: Vec<Tick>,
}

impl Series {
    fn new(key: SeriesKey) -> Self {
        Self {
            key,
            bars: Vec::new(),
            ticks: Vec::new(),
        }
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Bars in ascending time order; the last one may still be forming
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Latest bar at or before `timestamp`, else the earliest bar
    pub fn nearest_bar(&self, timestamp: DateTime<Utc>) -> Option<&Bar> {
        let idx = self.bars.partition_point(|b| b.timestamp <= timestamp);
        if idx == 0 {
            self.bars.first()
        } else {
            self.bars.get(idx - 1)
        }
    }

    /// Tick stamped exactly at `timestamp`
    pub fn tick_at(&self, timestamp: DateTime<Utc>) -> Option<&Tick> {
        self.ticks.iter().rev().find(|t| t.timestamp == timestamp)
    }

    pub(crate) fn last_bar_mut(&mut self) -> Option<&mut Bar> {
        self.bars.last_mut()
    }

    pub(crate) fn push_bar(&mut self, bar: Bar) {
        self.bars.push(bar);
    }
}

#[derive(Default)]
struct StoreInner {
    series: Vec<Arc<Mutex<Series>>>,
    index: HashMap<SeriesKey, SeriesId>,
}

fn lock(series: &Mutex<Series>) -> MutexGuard<'_, Series> {
    series.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of all series, addressed by [`SeriesId`]
#[derive(Default)]
pub struct SeriesStore {
    inner: RwLock<StoreInner>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load bars for a series, creating it if needed.
    ///
    /// Bars must be strictly ascending. Loading into an existing series
    /// replaces its bars.
    pub fn register(&self, key: SeriesKey, bars: Vec<Bar>) -> Result<SeriesId, SeriesError> {
        for pair in bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::OutOfOrder {
                    key,
                    previous: pair[0].timestamp,
                    timestamp: pair[1].timestamp,
                });
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = inner.index.get(&key) {
            lock(&inner.series[id.0]).bars = bars;
            return Ok(id);
        }

        let id = SeriesId(inner.series.len());
        let mut series = Series::new(key.clone());
        series.bars = bars;
        inner.series.push(Arc::new(Mutex::new(series)));
        inner.index.insert(key.clone(), id);
        telemetry::set_gauge(GaugeMetric::SeriesCount, inner.series.len() as f64);

        tracing::debug!(series = %key, %id, "Registered series");
        Ok(id)
    }

    /// Bulk-load ticks for a registered series (non-decreasing timestamps)
    pub fn load_ticks(&self, id: SeriesId, ticks: Vec<Tick>) -> Result<(), SeriesError> {
        let handle = self.handle(id)?;
        let mut series = lock(&handle);
        for pair in ticks.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::OutOfOrder {
                    key: series.key.clone(),
                    previous: pair[0].timestamp,
                    timestamp: pair[1].timestamp,
                });
            }
        }
        series.ticks = ticks;
        Ok(())
    }

    pub fn id(&self, key: &SeriesKey) -> Option<SeriesId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.index.get(key).copied()
    }

    /// Resolve a selection, preferring the series with the same slot
    pub fn find(&self, selection: &Selection) -> Option<SeriesId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = inner.index.get(&selection.series_key()) {
            return Some(id);
        }
        inner
            .index
            .iter()
            .filter(|(key, _)| selection.reads(key))
            .map(|(_, &id)| id)
            .min()
    }

    pub fn key(&self, id: SeriesId) -> Result<SeriesKey, SeriesError> {
        self.with_series(id, |s| s.key.clone())
    }

    pub fn ids(&self) -> Vec<SeriesId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (0..inner.series.len()).map(SeriesId).collect()
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = inner.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Series registered for a feed and symbol, smallest timeframe first
    pub fn ids_for(&self, data_feed: &str, symbol: &str) -> Vec<SeriesId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<_> = inner
            .index
            .iter()
            .filter(|(key, _)| key.data_feed == data_feed && key.symbol == symbol)
            .map(|(key, &id)| (key.timeframe.bucket_width(), id))
            .collect();
        matches.sort();
        matches.into_iter().map(|(_, id)| id).collect()
    }

    pub fn data_feeds(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let feeds: BTreeSet<_> = inner.index.keys().map(|k| k.data_feed.clone()).collect();
        feeds.into_iter().collect()
    }

    pub fn symbols(&self, data_feed: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let symbols: BTreeSet<_> = inner
            .index
            .keys()
            .filter(|k| k.data_feed == data_feed)
            .map(|k| k.symbol.clone())
            .collect();
        symbols.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against a series while holding only that series' lock
    pub fn with_series<R>(
        &self,
        id: SeriesId,
        f: impl FnOnce(&Series) -> R,
    ) -> Result<R, SeriesError> {
        let handle = self.handle(id)?;
        let series = lock(&handle);
        Ok(f(&series))
    }

    /// Snapshot of all bars of a series
    pub fn bars(&self, id: SeriesId) -> Result<Vec<Bar>, SeriesError> {
        self.with_series(id, |s| s.bars.clone())
    }

    pub(crate) fn with_series_mut<R>(
        &self,
        id: SeriesId,
        f: impl FnOnce(&mut Series) -> R,
    ) -> Result<R, SeriesError> {
        let handle = self.handle(id)?;
        let mut series = lock(&handle);
        Ok(f(&mut series))
    }

    fn handle(&self, id: SeriesId) -> Result<Arc<Mutex<Series>>, SeriesError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .series
            .get(id.0)
            .cloned()
            .ok_or_else(|| SeriesError::UnknownSeries(id.to_string()))
    }
}
