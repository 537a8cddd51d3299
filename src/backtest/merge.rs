//! Chronological merge of several bar sequences

use crate::market::MarketData;
use chrono::{DateTime, Utc};

/// A bar of one entry taking part in a time group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    /// Insertion index of the selection in the merged data
    pub entry: usize,
    /// Position of the bar in that selection's sequence
    pub position: usize,
}

/// All entries whose next pending bar shares the earliest timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGroup {
    pub timestamp: DateTime<Utc>,
    pub members: Vec<GroupMember>,
}

/// k-way merge over the bar sequences of a [`MarketData`].
///
/// Yields groups in non-decreasing timestamp order. Entries with equal
/// pending timestamps are grouped into one item and each advances by one bar.
pub struct TimeGroupCursor<'a> {
    data: &'a MarketData,
    cursors: Vec<usize>,
    consumed: usize,
    total: usize,
}

impl<'a> TimeGroupCursor<'a> {
    pub fn new(data: &'a MarketData) -> Self {
        Self {
            data,
            cursors: vec![0; data.len()],
            consumed: 0,
            total: data.bar_count(),
        }
    }

    /// Bars consumed so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bars in all sequences
    pub fn total(&self) -> usize {
        self.total
    }

    /// Percentage of bars consumed
    pub fn progress_pct(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.consumed * 100) / self.total).min(100) as u8
    }

    fn pending(&self, entry: usize) -> Option<DateTime<Utc>> {
        let (_, bars) = self.data.entry(entry)?;
        bars.get(self.cursors[entry]).map(|b| b.timestamp)
    }
}

impl Iterator for TimeGroupCursor<'_> {
    type Item = TimeGroup;

    fn next(&mut self) -> Option<Self::Item> {
        let timestamp = (0..self.cursors.len())
            .filter_map(|entry| self.pending(entry))
            .min()?;

        let members: Vec<GroupMember> = (0..self.cursors.len())
            .filter(|&entry| self.pending(entry) == Some(timestamp))
            .map(|entry| GroupMember {
                entry,
                position: self.cursors[entry],
            })
            .collect();

        for member in &members {
            self.cursors[member.entry] += 1;
        }
        self.consumed += members.len();

        Some(TimeGroup { timestamp, members })
    }
}
