//! Series types

use crate::market::{Bar, SeriesKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Handle of a series owned by the [`SeriesStore`](super::SeriesStore)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesId(pub(crate) usize);

impl SeriesId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "series-{}", self.0)
    }
}

/// Series store and aggregation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    /// The series has no seed bar to fold ticks into
    #[error("Invalid state: series {0} has no bars")]
    InvalidState(SeriesKey),
    /// The handle or key is not registered
    #[error("Unknown series: {0}")]
    UnknownSeries(String),
    /// Bulk-loaded data is not strictly time ordered
    #[error("Out of order data for {key}: {timestamp} does not follow {previous}")]
    OutOfOrder {
        key: SeriesKey,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}

/// Emitted when a tick opens a new bar, closing the previous one
#[derive(Debug, Clone, PartialEq)]
pub struct BarCompleted {
    /// Series that rolled over
    pub series: SeriesId,
    /// Its identity
    pub key: SeriesKey,
    /// The bar that was just closed and is now immutable
    pub completed: Bar,
    /// Start time of the newly opened bar
    pub opened_at: DateTime<Utc>,
}

/// What a tick append did to the trailing bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Trailing bar was widened in place
    Widened,
    /// A new bar was opened at the given bucket time
    Opened(DateTime<Utc>),
}

impl AppendOutcome {
    pub fn opened_bar(&self) -> bool {
        matches!(self, AppendOutcome::Opened(_))
    }
}
