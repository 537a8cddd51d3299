//! Series store and aggregation
//!
//! The [`SeriesStore`] owns every instrument's bars and ticks and hands out
//! [`SeriesId`] handles. The [`Aggregator`] is the only component allowed to
//! mutate a stored series after its bulk load.

mod aggregator;
mod store;
mod types;

pub use aggregator::Aggregator;
pub use store::{Series, SeriesStore};
pub use types::{AppendOutcome, BarCompleted, SeriesError, SeriesId};
