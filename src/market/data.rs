//! Ordered selection -> bars mapping handed to strategies

use super::{Bar, Selection};

/// Bar windows keyed by selection, in insertion order.
///
/// The last entry is the trigger instrument; its last bar is the trigger bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketData {
    entries: Vec<(Selection, Vec<Bar>)>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert bars for a selection, replacing any previous window in place
    pub fn insert(&mut self, selection: Selection, bars: Vec<Bar>) {
        match self.entries.iter_mut().find(|(s, _)| *s == selection) {
            Some((_, existing)) => *existing = bars,
            None => self.entries.push((selection, bars)),
        }
    }

    pub fn get(&self, selection: &Selection) -> Option<&[Bar]> {
        self.entries
            .iter()
            .find(|(s, _)| s == selection)
            .map(|(_, bars)| bars.as_slice())
    }

    /// Entry at an insertion index
    pub fn entry(&self, index: usize) -> Option<(&Selection, &[Bar])> {
        self.entries
            .get(index)
            .map(|(s, bars)| (s, bars.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Selection, &[Bar])> {
        self.entries.iter().map(|(s, bars)| (s, bars.as_slice()))
    }

    pub fn selections(&self) -> impl Iterator<Item = &Selection> {
        self.entries.iter().map(|(s, _)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trigger instrument and its bars
    pub fn last(&self) -> Option<(&Selection, &[Bar])> {
        self.entries.last().map(|(s, bars)| (s, bars.as_slice()))
    }

    /// Last bar of the trigger instrument
    pub fn trigger_bar(&self) -> Option<&Bar> {
        self.entries.last().and_then(|(_, bars)| bars.last())
    }

    pub(crate) fn trigger_bar_mut(&mut self) -> Option<&mut Bar> {
        self.entries.last_mut().and_then(|(_, bars)| bars.last_mut())
    }

    /// Total number of bars across all selections
    pub fn bar_count(&self) -> usize {
        self.entries.iter().map(|(_, bars)| bars.len()).sum()
    }
}

impl FromIterator<(Selection, Vec<Bar>)> for MarketData {
    fn from_iter<I: IntoIterator<Item = (Selection, Vec<Bar>)>>(iter: I) -> Self {
        let mut data = MarketData::new();
        for (selection, bars) in iter {
            data.insert(selection, bars);
        }
        data
    }
}
