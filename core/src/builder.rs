//! Builder API for ergonomic circuit breaker configuration

use crate::{
    callbacks::Callbacks,
    circuit::{CircuitBreaker, CircuitContext, Config},
    classifier::FailureClassifier,
    clock::{Clock, MonotonicClock},
    errors::ConfigError,
    shared::SharedCircuitBreaker,
    window::FailureWindow,
};
use std::sync::Arc;

/// Builder for creating circuit breakers with fluent API
///
/// Nothing is checked until [`build`](CircuitBuilder::build); invalid values
/// surface there as a [`ConfigError`].
pub struct CircuitBuilder {
    name: String,
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    failure_classifier: Option<Arc<dyn FailureClassifier>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            clock: None,
            failure_classifier: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Failures within the window needed to open the circuit
    pub fn failure_amount(mut self, amount: usize) -> Self {
        self.config.failure_amount = amount;
        self
    }

    /// Length of the sliding failure window in seconds
    pub fn failure_period_secs(mut self, seconds: f64) -> Self {
        self.config.failure_period_secs = seconds;
        self
    }

    /// Seconds after the latest failure before a probe is let through
    pub fn retry_after_secs(mut self, seconds: f64) -> Self {
        self.config.retry_after_secs = seconds;
        self
    }

    /// Consecutive half-open successes needed to close
    pub fn stable_at(mut self, successes: usize) -> Self {
        self.config.stable_at = successes;
        self
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn jitter_factor(mut self, factor: f64) -> Self {
        self.config.jitter_factor = factor;
        self
    }

    /// Use a custom time source (defaults to [`MonotonicClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set a failure classifier to filter which errors count as failures
    ///
    /// # Examples
    ///
    /// ```rust
    /// use breaker_guard::{CircuitBreaker, PredicateClassifier};
    /// use std::sync::Arc;
    ///
    /// let circuit = CircuitBreaker::builder("api")
    ///     .failure_classifier(Arc::new(PredicateClassifier::new(|ctx| {
    ///         // Only count slow errors
    ///         ctx.duration > 1.0
    ///     })))
    ///     .build()
    ///     .unwrap();
    /// # drop(circuit);
    /// ```
    pub fn failure_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.failure_classifier = Some(classifier);
        self
    }

    /// Set callback for when circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Validate the configuration and build the circuit breaker
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        let context = CircuitContext {
            name: self.name,
            config: self.config,
            clock,
            window: Arc::new(FailureWindow::new()),
            failure_classifier: self.failure_classifier,
        };

        CircuitBreaker::with_context_and_callbacks(context, self.callbacks)
    }

    /// Build a breaker that can be shared between threads
    pub fn build_shared(self) -> Result<SharedCircuitBreaker, ConfigError> {
        self.build().map(SharedCircuitBreaker::new)
    }
}
