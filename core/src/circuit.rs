//! Circuit breaker implementation using state machines
//!
//! The breaker exposes a begin/end contract around the caller's operation:
//! [`CircuitBreaker::attempt`] decides whether the call may proceed and hands
//! out a [`Permit`], [`CircuitBreaker::report`] takes the permit back together
//! with the [`Outcome`]. [`CircuitBreaker::call`] does both around a closure.

use crate::{
    callbacks::Callbacks,
    classifier::{FailureClassifier, FailureContext},
    clock::{Clock, MonotonicClock},
    errors::{CircuitError, CircuitOpenError, ConfigError},
    stability::StabilityCounter,
    window::FailureWindow,
};
use state_machines::state_machine;
use std::fmt;
use std::sync::Arc;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Failures within the window needed to open the circuit
    pub failure_amount: usize,

    /// Length of the sliding failure window in seconds
    pub failure_period_secs: f64,

    /// Seconds since the most recent failure before an open circuit lets a
    /// probe through
    pub retry_after_secs: f64,

    /// Consecutive successes needed to close the circuit again
    pub stable_at: usize,

    /// Jitter factor for retry_after (0.0 = no jitter, 1.0 = full jitter)
    /// Uses chrono-machines formula: retry_after * (1 - jitter + rand * jitter)
    pub jitter_factor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_amount: 5,
            failure_period_secs: 30.0,
            retry_after_secs: 6000.0,
            stable_at: 2,
            jitter_factor: 0.0,
        }
    }
}

impl Config {
    /// Reject settings the breaker cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_amount == 0 {
            return Err(ConfigError::ZeroFailureAmount);
        }
        if self.stable_at == 0 {
            return Err(ConfigError::ZeroStableAt);
        }
        for (field, value) in [
            ("failure_period_secs", self.failure_period_secs),
            ("retry_after_secs", self.retry_after_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::JitterOutOfRange(self.jitter_factor));
        }
        Ok(())
    }
}

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BreakerState {
    /// Calls proceed normally
    Closed,
    /// Calls are rejected without running
    Open,
    /// One probe at a time decides whether to close or reopen
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "Closed",
            BreakerState::Open => "Open",
            BreakerState::HalfOpen => "HalfOpen",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a guarded operation as seen by the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl<T, E> From<&Result<T, E>> for Outcome {
    fn from(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(_) => Outcome::Failure,
        }
    }
}

/// Admission token returned by [`CircuitBreaker::attempt`]
///
/// Hand it back through [`CircuitBreaker::report`] once the operation is done.
/// A half-open breaker admits no other call while its probe permit is out.
#[derive(Debug)]
#[must_use = "a permit must be reported back to the breaker"]
pub struct Permit {
    /// Probe id when admitted as the half-open probe
    probe: Option<u64>,
}

impl Permit {
    /// Whether this permit is the half-open recovery probe
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }
}

/// Circuit breaker context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub window: Arc<FailureWindow>,
    pub failure_classifier: Option<Arc<dyn FailureClassifier>>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            clock: Arc::new(MonotonicClock::new()),
            window: Arc::new(FailureWindow::new()),
            failure_classifier: None,
        }
    }
}

impl fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("window", &self.window)
            .field(
                "failure_classifier",
                &self
                    .failure_classifier
                    .as_ref()
                    .map(|_| "<dyn FailureClassifier>"),
            )
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
    /// Retry delay drawn for this opening (jitter applied once)
    pub retry_after_secs: f64,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    /// Id of the outstanding probe permit
    pub probe_in_flight: Option<u64>,
    /// Set once the stability counter confirms recovery
    pub stable: bool,
}

state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [retry_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// Enough fresh failures in the window (prunes stale ones)
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        let failures = ctx
            .window
            .recent_count(ctx.clock.now(), ctx.config.failure_period_secs);
        failures >= ctx.config.failure_amount
    }
}

impl Circuit<HalfOpen> {
    /// A failed probe reopens unconditionally
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        true
    }

    fn should_close(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open().is_some_and(|data| data.stable)
    }
}

impl Circuit<Open> {
    /// Strictly more than the retry delay has passed since the latest failure
    fn retry_elapsed(&self, ctx: &CircuitContext) -> bool {
        let Some(last_failure) = ctx.window.most_recent() else {
            return false;
        };
        let Some(data) = self.state_data_open() else {
            return false;
        };
        ctx.clock.now() - last_failure > data.retry_after_secs
    }
}

/// Circuit breaker public API
///
/// Single-owner: every method that changes bookkeeping takes `&mut self`.
/// Wrap it in a [`SharedCircuitBreaker`](crate::SharedCircuitBreaker) to
/// share one breaker between threads.
pub struct CircuitBreaker {
    machine: DynamicCircuit,
    context: CircuitContext,
    callbacks: Callbacks,
    stability: StabilityCounter,
    last_opened_at: f64,
    probes_issued: u64,
}

impl CircuitBreaker {
    /// Create a breaker on the monotonic clock (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        let context = CircuitContext {
            name: name.into(),
            config,
            ..CircuitContext::default()
        };
        Self::with_context_and_callbacks(context, Callbacks::new())
    }

    /// Create a circuit breaker with custom context and callbacks (used by builder)
    pub(crate) fn with_context_and_callbacks(
        context: CircuitContext,
        callbacks: Callbacks,
    ) -> Result<Self, ConfigError> {
        context.config.validate()?;

        let machine = DynamicCircuit::new(context.clone());
        let stability = StabilityCounter::new(context.config.stable_at);

        Ok(Self {
            machine,
            context,
            callbacks,
            stability,
            last_opened_at: 0.0,
            probes_issued: 0,
        })
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> crate::builder::CircuitBuilder {
        crate::builder::CircuitBuilder::new(name)
    }

    /// Ask to run the guarded operation
    ///
    /// An open circuit whose retry delay has passed since the latest failure
    /// moves to HalfOpen here and admits this call as its probe.
    pub fn attempt(&mut self) -> Result<Permit, CircuitOpenError> {
        if self.state() == BreakerState::Open {
            if self.machine.handle(CircuitEvent::AttemptReset).is_ok() {
                self.stability.reset();
                tracing::info!(circuit = %self.context.name, "circuit half-open, probing");
                self.callbacks.half_opened(&self.context.name);
            } else {
                self.stability.reset();
                tracing::debug!(circuit = %self.context.name, "call rejected, circuit open");
                return Err(self.rejection(BreakerState::Open));
            }
        }

        match self.state() {
            BreakerState::HalfOpen => {
                let busy = self
                    .machine
                    .half_open_data()
                    .is_none_or(|data| data.probe_in_flight.is_some());
                if busy {
                    tracing::debug!(circuit = %self.context.name, "call rejected, probe in flight");
                    return Err(self.rejection(BreakerState::HalfOpen));
                }
                self.probes_issued += 1;
                let id = self.probes_issued;
                if let Some(data) = self.machine.half_open_data_mut() {
                    data.probe_in_flight = Some(id);
                }
                Ok(Permit { probe: Some(id) })
            }
            BreakerState::Open => Err(self.rejection(BreakerState::Open)),
            BreakerState::Closed => Ok(Permit { probe: None }),
        }
    }

    /// Report how the admitted operation went
    ///
    /// While HalfOpen only the outstanding probe decides the next transition.
    /// Any other permit's failure is recorded in the window without tripping,
    /// and its success is dropped.
    pub fn report(&mut self, permit: Permit, outcome: Outcome) {
        let holds_probe = self.holds_probe(&permit);
        self.release_probe(&permit);

        if self.state() == BreakerState::HalfOpen && !holds_probe {
            tracing::debug!(circuit = %self.context.name, ?outcome, "late report ignored while probing");
            if outcome == Outcome::Failure {
                self.record_late_failure();
            }
            return;
        }

        match outcome {
            Outcome::Failure => self.on_failure(),
            Outcome::Success => self.on_success(),
        }
    }

    /// Return a permit without recording anything (the error was classified
    /// as not the dependency's fault)
    pub fn release(&mut self, permit: Permit) {
        self.release_probe(&permit);
    }

    /// Execute a fallible operation with circuit breaker protection
    ///
    /// The operation runs at most once. Its error comes back unchanged inside
    /// [`CircuitError::Execution`].
    pub fn call<T, E, F>(&mut self, f: F) -> Result<T, CircuitError<E>>
    where
        E: 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.attempt()?;

        let start = self.context.clock.now();
        let result = f();
        let duration = self.context.clock.now() - start;

        self.settle(permit, &result, duration);
        result.map_err(CircuitError::Execution)
    }

    /// Classify a finished call and report or release its permit
    pub(crate) fn settle<T, E: 'static>(
        &mut self,
        permit: Permit,
        result: &Result<T, E>,
        duration: f64,
    ) {
        match result {
            Ok(_) => self.report(permit, Outcome::Success),
            Err(e) => {
                if self.counts_as_failure(e, duration) {
                    self.report(permit, Outcome::Failure);
                } else {
                    tracing::debug!(circuit = %self.context.name, "error ignored by classifier");
                    self.release(permit);
                }
            }
        }
    }

    fn counts_as_failure<E: 'static>(&self, error: &E, duration: f64) -> bool {
        let Some(classifier) = &self.context.failure_classifier else {
            return true;
        };
        let ctx = FailureContext {
            circuit_name: &self.context.name,
            error: error as &dyn std::any::Any,
            duration,
        };
        classifier.should_trip(&ctx)
    }

    fn on_failure(&mut self) {
        if self.state() == BreakerState::Open {
            // late report from a call admitted before the trip
            self.record_late_failure();
            return;
        }

        let now = self.context.clock.now();
        self.context.window.record(now);
        if self.machine.handle(CircuitEvent::Trip).is_ok() {
            self.mark_open(now);
        }
    }

    /// Record a failure that must not drive a transition
    fn record_late_failure(&mut self) {
        let now = self.context.clock.now();
        self.context.window.record(now);
        self.context
            .window
            .recent_count(now, self.context.config.failure_period_secs);
    }

    fn on_success(&mut self) {
        if self.state() == BreakerState::Open {
            return;
        }

        if !self.stability.record_success() {
            return;
        }

        if let Some(data) = self.machine.half_open_data_mut() {
            data.stable = true;
        }
        if self.machine.handle(CircuitEvent::Close).is_ok() {
            tracing::info!(circuit = %self.context.name, "circuit closed");
            self.callbacks.closed(&self.context.name);
        }
    }

    fn holds_probe(&self, permit: &Permit) -> bool {
        permit.probe.is_some()
            && self
                .machine
                .half_open_data()
                .is_some_and(|data| data.probe_in_flight == permit.probe)
    }

    fn release_probe(&mut self, permit: &Permit) {
        if let Some(id) = permit.probe
            && let Some(data) = self.machine.half_open_data_mut()
            && data.probe_in_flight == Some(id)
        {
            data.probe_in_flight = None;
        }
    }

    /// Apply Open-state bookkeeping (timestamp, retry delay, callback)
    fn mark_open(&mut self, now: f64) {
        let retry_after_secs = self.retry_delay();
        if let Some(data) = self.machine.open_data_mut() {
            data.opened_at = now;
            data.retry_after_secs = retry_after_secs;
        }
        self.last_opened_at = now;
        self.stability.reset();

        tracing::warn!(
            circuit = %self.context.name,
            failures = self.context.window.len(),
            retry_after_secs,
            "circuit opened"
        );
        self.callbacks.opened(&self.context.name);
    }

    /// Retry delay for a new opening, jittered when configured
    fn retry_delay(&self) -> f64 {
        let config = &self.context.config;
        if config.jitter_factor <= 0.0 {
            return config.retry_after_secs;
        }

        // chrono-machines works in whole milliseconds
        let base_delay_ms = (config.retry_after_secs * 1000.0) as u64;
        if base_delay_ms == 0 {
            return config.retry_after_secs;
        }

        let policy = chrono_machines::Policy {
            max_attempts: 1,
            base_delay_ms,
            multiplier: 1.0,
            max_delay_ms: base_delay_ms,
        };
        let delay_ms = policy.calculate_delay(1, config.jitter_factor);
        (delay_ms as f64) / 1000.0
    }

    fn rejection(&self, state: BreakerState) -> CircuitOpenError {
        CircuitOpenError {
            circuit: self.context.name.clone(),
            state,
            opened_at: self.last_opened_at,
        }
    }

    /// Current state (does not evaluate the retry delay)
    pub fn state(&self) -> BreakerState {
        match self.machine.current_state() {
            "Open" => BreakerState::Open,
            "HalfOpen" => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BreakerState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == BreakerState::HalfOpen
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.context.clock)
    }

    /// Failures inside the window as of now (drops stale ones)
    pub fn recent_failures(&self) -> usize {
        self.context.window.recent_count(
            self.context.clock.now(),
            self.context.config.failure_period_secs,
        )
    }

    /// Timestamp of the latest recorded failure
    pub fn last_failure_at(&self) -> Option<f64> {
        self.context.window.most_recent()
    }

    /// Stability counter value, from `-stable_at` up to `-1`
    pub fn successes_until_stable(&self) -> i64 {
        self.stability.value()
    }

    /// Clear all failures and reset circuit to Closed state
    pub fn reset(&mut self) {
        self.context.window.clear();
        self.stability.reset();
        self.machine = DynamicCircuit::new(self.context.clone());
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.context.name)
            .field("state", &self.state())
            .field("config", &self.context.config)
            .field("stability", &self.stability)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
