//! Consecutive-success tracking for recovery

/// Counts up from `-stable_at` toward zero, one step per success
///
/// Reaching zero means recovery is confirmed; the counter then rearms itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityCounter {
    stable_at: i64,
    remaining: i64,
}

impl StabilityCounter {
    pub fn new(stable_at: usize) -> Self {
        let stable_at = i64::try_from(stable_at).unwrap_or(i64::MAX);
        Self {
            stable_at,
            remaining: -stable_at,
        }
    }

    /// Rearm at `-stable_at`
    pub fn reset(&mut self) {
        self.remaining = -self.stable_at;
    }

    /// Count one success; returns `true` (and rearms) when zero is reached
    pub fn record_success(&mut self) -> bool {
        self.remaining += 1;
        if self.remaining == 0 {
            self.reset();
            return true;
        }
        false
    }

    /// Current value, always in `-stable_at..0`
    pub fn value(&self) -> i64 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_negative_stable_at() {
        let counter = StabilityCounter::new(3);
        assert_eq!(counter.value(), -3);
    }

    #[test]
    fn test_confirms_after_stable_at_successes() {
        let mut counter = StabilityCounter::new(2);

        assert!(!counter.record_success());
        assert_eq!(counter.value(), -1);

        assert!(counter.record_success());
        assert_eq!(counter.value(), -2, "counter rearms on confirmation");
    }

    #[test]
    fn test_stable_at_one_confirms_immediately() {
        let mut counter = StabilityCounter::new(1);

        assert!(counter.record_success());
        assert!(counter.record_success());
        assert_eq!(counter.value(), -1);
    }

    #[test]
    fn test_reset_discards_progress() {
        let mut counter = StabilityCounter::new(3);

        counter.record_success();
        counter.record_success();
        counter.reset();

        assert_eq!(counter.value(), -3);
    }
}
