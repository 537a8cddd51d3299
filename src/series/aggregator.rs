//! Incremental tick-to-bar aggregation

use super::{AppendOutcome, BarCompleted, SeriesError, SeriesId, SeriesStore};
use crate::market::{Bar, Tick};
use crate::telemetry::{self, CounterMetric};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Capacity of the bar-completed broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sole writer of the trailing bar of every series.
///
/// A tick either widens the trailing bar or, once it is at least one bucket
/// past the trailing bar's start, opens a new bucket-aligned bar and
/// broadcasts [`BarCompleted`].
pub struct Aggregator {
    store: Arc<SeriesStore>,
    last_ticks: Mutex<HashMap<SeriesId, Tick>>,
    events: broadcast::Sender<BarCompleted>,
}

impl Aggregator {
    pub fn new(store: Arc<SeriesStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            last_ticks: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn store(&self) -> &Arc<SeriesStore> {
        &self.store
    }

    /// Receive a [`BarCompleted`] for every bar rollover from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BarCompleted> {
        self.events.subscribe()
    }

    /// Fold one tick into a series.
    ///
    /// Fails with [`SeriesError::InvalidState`] if the series has no seed bar.
    pub fn append_tick(&self, id: SeriesId, tick: &Tick) -> Result<AppendOutcome, SeriesError> {
        let event = self.store.with_series_mut(id, |series| {
            let width = series.key().timeframe.bucket_width();
            let key = series.key().clone();
            let last = series
                .last_bar_mut()
                .ok_or_else(|| SeriesError::InvalidState(key.clone()))?;

            if tick.timestamp - last.timestamp >= width {
                let completed = last.clone();
                let opened_at = completed.timestamp + width;
                series.push_bar(Bar::from_tick(opened_at, tick));
                Ok(Some(BarCompleted {
                    series: id,
                    key,
                    completed,
                    opened_at,
                }))
            } else {
                last.widen(tick);
                Ok(None)
            }
        })??;

        self.last_ticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tick.clone());
        telemetry::increment(CounterMetric::TicksAppended, 1);

        match event {
            Some(event) => {
                let opened_at = event.opened_at;
                tracing::debug!(series = %event.key, %opened_at, "Bar completed");
                telemetry::increment(CounterMetric::BarsCompleted, 1);
                // No subscribers is not an error
                let _ = self.events.send(event);
                Ok(AppendOutcome::Opened(opened_at))
            }
            None => Ok(AppendOutcome::Widened),
        }
    }

    /// Most recent tick appended to a series
    pub fn last_tick(&self, id: SeriesId) -> Option<Tick> {
        self.last_ticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Most recent tick across all series of a feed and symbol
    pub fn last_tick_for(&self, data_feed: &str, symbol: &str) -> Option<Tick> {
        let ids = self.store.ids_for(data_feed, symbol);
        let cache = self.last_ticks.lock().unwrap_or_else(PoisonError::into_inner);
        ids.iter()
            .filter_map(|id| cache.get(id))
            .max_by_key(|t| t.timestamp)
            .cloned()
    }
}
