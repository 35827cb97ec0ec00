//! Error types for circuit breaker operations

use crate::BreakerState;
use thiserror::Error;

/// The breaker refused the call without running it
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Circuit '{circuit}' rejected the call while {state} (opened at {opened_at})")]
pub struct CircuitOpenError {
    pub circuit: String,
    /// `Open`, or `HalfOpen` when another probe is already in flight
    pub state: BreakerState,
    /// Clock reading when the circuit last opened
    pub opened_at: f64,
}

/// Errors returned by a guarded call
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// Circuit is open, the operation was not invoked
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    /// The wrapped operation failed; its error is passed through untouched
    #[error("Circuit execution failed: {0}")]
    Execution(#[source] E),
}

impl<E> CircuitError<E> {
    /// True when the breaker rejected the call
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitError::Open(_))
    }

    /// The operation's own error, if it ran and failed
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitError::Execution(e) => Some(e),
            CircuitError::Open(_) => None,
        }
    }
}

/// Invalid breaker configuration, reported at construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failure_amount must be greater than 0")]
    ZeroFailureAmount,
    #[error("stable_at must be greater than 0")]
    ZeroStableAt,
    #[error("{field} must be a positive, finite number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("jitter_factor must be within 0.0..=1.0 (got {0})")]
    JitterOutOfRange(f64),
}
