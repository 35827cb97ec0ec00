//! Time sources for the breaker
//!
//! Every timestamp the breaker records or compares comes from a [`Clock`].
//! Times are monotonic seconds as `f64`, relative to an arbitrary anchor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of the current instant, in seconds
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in seconds since the clock's anchor
    fn now(&self) -> f64;
}

/// Wall-independent clock anchored at construction (immune to NTP adjustments)
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start_time: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for deterministic tests
///
/// Time only moves when [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) is called. Share it with a breaker through an
/// `Arc` and keep a handle to move time forward.
///
/// # Example
///
/// ```rust
/// use breaker_guard::{CircuitBreaker, Clock, ManualClock};
/// use std::sync::Arc;
///
/// let clock = Arc::new(ManualClock::new());
/// let circuit = CircuitBreaker::builder("billing")
///     .clock(clock.clone())
///     .build()
///     .unwrap();
///
/// clock.advance(61.0);
/// assert_eq!(clock.now(), 61.0);
/// # drop(circuit);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 bit pattern
    now: AtomicU64,
}

impl ManualClock {
    /// Clock frozen at t = 0
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    /// Clock frozen at the given instant
    pub fn starting_at(seconds: f64) -> Self {
        Self {
            now: AtomicU64::new(seconds.to_bits()),
        }
    }

    /// Move time forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + seconds).to_bits())
            });
    }

    /// Jump to an absolute instant
    pub fn set(&self, seconds: f64) {
        self.now.store(seconds.to_bits(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::Acquire))
    }
}
