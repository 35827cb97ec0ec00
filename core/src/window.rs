//! Sliding failure window
//!
//! Failures are kept as an ordered list of timestamps. Staleness is judged by
//! elapsed time only: a counting read drops every timestamp older than the
//! window before counting what is left.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// Thread-safe, time-pruned record of recent failures
#[derive(Debug, Default)]
pub struct FailureWindow {
    /// Failure timestamps in seconds, oldest first
    timestamps: Mutex<VecDeque<f64>>,
}

impl FailureWindow {
    /// Create an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure observed at `at`
    pub fn record(&self, at: f64) {
        self.timestamps.lock().push_back(at);
    }

    /// Prune failures older than `period_secs` relative to `now`, then count
    /// the survivors
    ///
    /// A timestamp survives while `now - timestamp <= period_secs`.
    pub fn recent_count(&self, now: f64, period_secs: f64) -> usize {
        let mut timestamps = self.timestamps.lock();

        while let Some(&oldest) = timestamps.front() {
            if now - oldest <= period_secs {
                break;
            }
            timestamps.pop_front();
        }

        timestamps.len()
    }

    /// Timestamp of the latest recorded failure (does not prune)
    pub fn most_recent(&self) -> Option<f64> {
        self.timestamps.lock().back().copied()
    }

    /// Number of stored timestamps, stale ones included
    pub fn len(&self) -> usize {
        self.timestamps.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.lock().is_empty()
    }

    /// Forget every recorded failure
    pub fn clear(&self) {
        self.timestamps.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let window = FailureWindow::new();

        window.record(1.0);
        window.record(2.0);
        window.record(3.0);

        assert_eq!(window.recent_count(3.0, 30.0), 3);
        assert_eq!(window.most_recent(), Some(3.0));
    }

    #[test]
    fn test_count_prunes_stale_entries() {
        let window = FailureWindow::new();

        window.record(0.0);
        window.record(10.0);
        window.record(50.0);

        assert_eq!(window.len(), 3);
        assert_eq!(window.recent_count(50.0, 30.0), 1);
        assert_eq!(window.len(), 1, "stale timestamps should be dropped");
        assert_eq!(window.most_recent(), Some(50.0));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let window = FailureWindow::new();

        window.record(0.0);

        assert_eq!(window.recent_count(86_400.0, 86_400.0), 1);
        assert_eq!(window.recent_count(86_401.0, 86_400.0), 0);
    }

    #[test]
    fn test_many_old_failures_never_count() {
        let window = FailureWindow::new();

        for i in 0..1_000 {
            window.record(i as f64 * 0.001);
        }

        assert_eq!(window.recent_count(100.0, 30.0), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_most_recent_does_not_prune() {
        let window = FailureWindow::new();

        window.record(5.0);

        assert_eq!(window.most_recent(), Some(5.0));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_clear() {
        let window = FailureWindow::new();

        window.record(1.0);
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.most_recent(), None);
    }
}
