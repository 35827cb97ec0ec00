//! breaker-guard - circuit breaker with a time-pruned failure window
//!
//! This crate provides a circuit breaker for calls to an unreliable dependency:
//! - Sliding failure window pruned by elapsed time, not by count
//! - State machine for the breaker lifecycle (Closed → Open → HalfOpen)
//! - Retry eligibility measured from the most recent failure
//! - Stability counter gating the return from HalfOpen to Closed
//! - Injectable clock, so tests can freeze and advance time
//! - Mutex-guarded variant for concurrent callers with a single half-open probe
//!
//! # Example
//!
//! ```rust
//! use breaker_guard::{CircuitBreaker, CircuitError};
//!
//! let mut circuit = CircuitBreaker::builder("payment_api")
//!     .failure_amount(5)
//!     .failure_period_secs(30.0)
//!     .retry_after_secs(60.0)
//!     .stable_at(2)
//!     .on_open(|name| eprintln!("Circuit {} opened!", name))
//!     .build()
//!     .expect("valid configuration");
//!
//! // Execute with circuit protection
//! match circuit.call(|| Ok::<_, String>("charged")) {
//!     Ok(receipt) => println!("{receipt}"),
//!     Err(CircuitError::Open(rejected)) => println!("skipped: {rejected}"),
//!     Err(CircuitError::Execution(e)) => println!("upstream failed: {e}"),
//! }
//!
//! // Or drive the begin/end contract by hand
//! if let Ok(permit) = circuit.attempt() {
//!     let result: Result<(), String> = Ok(());
//!     circuit.report(permit, (&result).into());
//! }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod clock;
pub mod errors;
pub mod shared;
pub mod stability;
pub mod window;

pub use builder::CircuitBuilder;
pub use circuit::{BreakerState, CircuitBreaker, Config, Outcome, Permit};
pub use classifier::{DefaultClassifier, FailureClassifier, FailureContext, PredicateClassifier};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::{CircuitError, CircuitOpenError, ConfigError};
pub use shared::SharedCircuitBreaker;
pub use stability::StabilityCounter;
pub use window::FailureWindow;
