//! Backtest progress reporting

/// Smallest progress change reported
pub const MIN_PROGRESS_DELTA: u8 = 5;

/// Observable result of one progress poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Progress moved by at least [`MIN_PROGRESS_DELTA`]
    Progress(u8),
    /// The backtest reached 100%
    Finished,
}

/// Turns polled percentages into progress events.
///
/// Inactive until [`begin`](Self::begin). Reaching 100 yields
/// [`ProgressUpdate::Finished`] once and deactivates the tracker.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    active: bool,
    last_reported: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for a new backtest
    pub fn begin(&mut self) {
        self.active = true;
        self.last_reported = 0;
    }

    /// Disarm without reporting completion
    pub fn cancel(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn observe(&mut self, pct: u8) -> Option<ProgressUpdate> {
        if !self.active {
            return None;
        }
        if pct >= 100 {
            self.active = false;
            return Some(ProgressUpdate::Finished);
        }
        if pct >= self.last_reported.saturating_add(MIN_PROGRESS_DELTA) {
            self.last_reported = pct;
            return Some(ProgressUpdate::Progress(pct));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_until_begin() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.observe(50), None);
        assert_eq!(tracker.observe(100), None);
    }

    #[test]
    fn test_reports_deltas_of_five() {
        let mut tracker = ProgressTracker::new();
        tracker.begin();

        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.observe(5), Some(ProgressUpdate::Progress(5)));
        assert_eq!(tracker.observe(9), None);
        assert_eq!(tracker.observe(42), Some(ProgressUpdate::Progress(42)));
    }

    #[test]
    fn test_finished_once_then_disabled() {
        let mut tracker = ProgressTracker::new();
        tracker.begin();

        assert_eq!(tracker.observe(100), Some(ProgressUpdate::Finished));
        assert!(!tracker.is_active());
        assert_eq!(tracker.observe(100), None);

        tracker.begin();
        assert_eq!(tracker.observe(10), Some(ProgressUpdate::Progress(10)));
    }

    #[test]
    fn test_cancel_suppresses_finish() {
        let mut tracker = ProgressTracker::new();
        tracker.begin();
        tracker.cancel();
        assert_eq!(tracker.observe(100), None);
    }
}
