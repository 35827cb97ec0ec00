//! Thread-safe breaker
//!
//! One mutex guards state, failure window and stability counter together.
//! Admission and reporting each take the lock once; the guarded operation
//! runs with the lock released.

use crate::{
    circuit::{BreakerState, CircuitBreaker, Outcome, Permit},
    clock::Clock,
    errors::{CircuitError, CircuitOpenError},
};
use parking_lot::Mutex;
use std::sync::Arc;

/// A [`CircuitBreaker`] shared between concurrent callers
///
/// Half-open admits a single probe; everyone else fails fast with
/// [`CircuitOpenError`] until the probe is reported.
///
/// # Example
///
/// ```rust
/// use breaker_guard::CircuitBreaker;
/// use std::sync::Arc;
///
/// let breaker = Arc::new(
///     CircuitBreaker::builder("search")
///         .failure_amount(3)
///         .build_shared()
///         .unwrap(),
/// );
///
/// let worker = {
///     let breaker = Arc::clone(&breaker);
///     std::thread::spawn(move || breaker.call(|| Ok::<_, String>("hit")))
/// };
/// assert_eq!(worker.join().unwrap().unwrap(), "hit");
/// ```
#[derive(Debug)]
pub struct SharedCircuitBreaker {
    inner: Mutex<CircuitBreaker>,
    clock: Arc<dyn Clock>,
}

impl SharedCircuitBreaker {
    pub fn new(breaker: CircuitBreaker) -> Self {
        let clock = breaker.clock();
        Self {
            inner: Mutex::new(breaker),
            clock,
        }
    }

    /// Begin-guard under the lock
    pub fn attempt(&self) -> Result<Permit, CircuitOpenError> {
        self.inner.lock().attempt()
    }

    /// End-guard under the lock
    pub fn report(&self, permit: Permit, outcome: Outcome) {
        self.inner.lock().report(permit, outcome);
    }

    /// Give a permit back without recording an outcome
    pub fn release(&self, permit: Permit) {
        self.inner.lock().release(permit);
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// If the operation panics, the call is reported as a failure while
    /// unwinding.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        E: 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.attempt()?;
        let mut in_flight = InFlight {
            breaker: self,
            permit: Some(permit),
        };

        let start = self.clock.now();
        let result = f();
        let duration = self.clock.now() - start;

        if let Some(permit) = in_flight.permit.take() {
            self.inner.lock().settle(permit, &result, duration);
        }
        result.map_err(CircuitError::Execution)
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BreakerState::Closed
    }

    pub fn recent_failures(&self) -> usize {
        self.inner.lock().recent_failures()
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// Run `f` with exclusive access to the underlying breaker
    pub fn with_breaker<R>(&self, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

/// Reports a failure if dropped while still holding the permit
struct InFlight<'a> {
    breaker: &'a SharedCircuitBreaker,
    permit: Option<Permit>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.breaker.report(permit, Outcome::Failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn shared(clock: &Arc<ManualClock>, failure_amount: usize) -> Arc<SharedCircuitBreaker> {
        Arc::new(
            CircuitBreaker::builder("shared")
                .failure_amount(failure_amount)
                .failure_period_secs(60.0)
                .retry_after_secs(60.0)
                .stable_at(2)
                .clock(clock.clone())
                .build_shared()
                .unwrap(),
        )
    }

    #[test]
    fn test_concurrent_failures_trip() {
        let clock = Arc::new(ManualClock::new());
        let breaker = shared(&clock, 5);
        let rejected = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let breaker = Arc::clone(&breaker);
            let rejected = Arc::clone(&rejected);
            handles.push(thread::spawn(move || {
                for _ in 0..10 {
                    if let Err(CircuitError::Open(_)) = breaker.call(|| Err::<(), _>("down")) {
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(breaker.is_open());
        // each thread holds at most one permit when the fifth failure lands
        assert!(rejected.load(Ordering::SeqCst) >= 80 - 5 - 7);
    }

    #[test]
    fn test_only_one_probe_is_admitted() {
        let clock = Arc::new(ManualClock::new());
        let breaker = shared(&clock, 1);
        let _ = breaker.call(|| Err::<(), _>("down"));
        assert!(breaker.is_open());

        clock.advance(61.0);

        let admitted = Arc::new(AtomicUsize::new(0));
        let rejected = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let release = Arc::new(Barrier::new(2));

        let mut handles = vec![];
        for _ in 0..8 {
            let breaker = Arc::clone(&breaker);
            let admitted = Arc::clone(&admitted);
            let rejected = Arc::clone(&rejected);
            let barrier = Arc::clone(&barrier);
            let release = Arc::clone(&release);
            handles.push(thread::spawn(move || {
                barrier.wait();
                match breaker.attempt() {
                    Ok(permit) => {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        // hold the probe until the main thread has looked
                        release.wait();
                        breaker.report(permit, Outcome::Success);
                    }
                    Err(err) => {
                        assert_eq!(err.state, BreakerState::HalfOpen);
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        while admitted.load(Ordering::SeqCst) + rejected.load(Ordering::SeqCst) < 8 {
            thread::yield_now();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(rejected.load(Ordering::SeqCst), 7);
        release.wait();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn test_panicking_probe_reopens() {
        let clock = Arc::new(ManualClock::new());
        let breaker = shared(&clock, 1);
        let _ = breaker.call(|| Err::<(), _>("down"));
        clock.advance(61.0);

        let panicking = Arc::clone(&breaker);
        let result = thread::spawn(move || {
            let _ = panicking.call(|| -> Result<(), String> { panic!("probe blew up") });
        })
        .join();

        assert!(result.is_err());
        assert!(breaker.is_open(), "a panicking probe counts as a failure");
        assert_eq!(
            breaker.with_breaker(|b| b.last_failure_at()),
            Some(61.0)
        );
    }

    #[test]
    fn test_shared_recovers_after_stable_at() {
        let clock = Arc::new(ManualClock::new());
        let breaker = shared(&clock, 2);

        let _ = breaker.call(|| Err::<(), _>("down"));
        let _ = breaker.call(|| Err::<(), _>("down"));
        assert!(breaker.is_open());
        assert!(breaker.call(|| Ok::<_, String>(())).unwrap_err().is_open());

        clock.advance(61.0);
        breaker.call(|| Ok::<_, String>(())).unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.call(|| Ok::<_, String>(())).unwrap();
        assert!(breaker.is_closed());

        breaker.reset();
        assert_eq!(breaker.recent_failures(), 0);
    }
}
