//! Basic circuit breaker usage example
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to see transitions.

use breaker_guard::{CircuitBreaker, CircuitError, ManualClock};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Stand-in for a flaky upstream: the status it answers with
fn flaky_service(status: u16) -> Result<String, String> {
    match status {
        200 | 201 => Ok(format!("upstream answered {status}")),
        _ => Err(format!("upstream answered {status}")),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Circuit Breaker Basic Example ===\n");

    // A manual clock lets the demo skip the cooldown instantly
    let clock = Arc::new(ManualClock::new());

    let mut circuit = CircuitBreaker::builder("payment_api")
        .failure_amount(3)
        .failure_period_secs(10.0)
        .retry_after_secs(5.0)
        .stable_at(2)
        .clock(clock.clone())
        .on_open(|name| println!("Circuit '{}' opened!", name))
        .on_half_open(|name| println!("Circuit '{}' half-open, testing...", name))
        .on_close(|name| println!("Circuit '{}' closed!", name))
        .build()
        .expect("valid configuration");

    println!("Initial state: {}\n", circuit.state_name());

    println!("--- Successful calls ---");
    for _ in 0..2 {
        report(circuit.call(|| flaky_service(200)));
    }
    println!("State: {}\n", circuit.state_name());

    println!("--- Triggering failures ---");
    for _ in 0..3 {
        report(circuit.call(|| flaky_service(500)));
        clock.advance(1.0);
    }
    println!("State: {} (circuit opened)\n", circuit.state_name());

    println!("--- Attempting call while open ---");
    report(circuit.call(|| flaky_service(200)));
    println!();

    println!("--- Waiting out the cooldown ---");
    clock.advance(6.0);
    report(circuit.call(|| flaky_service(200)));
    println!("State: {}", circuit.state_name());
    report(circuit.call(|| flaky_service(200)));
    println!("State: {}\n", circuit.state_name());

    println!("--- Resetting circuit ---");
    circuit.reset();
    println!("State after reset: {}", circuit.state_name());
}

fn report(result: Result<String, CircuitError<String>>) {
    match result {
        Ok(body) => println!("ok: {body}"),
        Err(CircuitError::Open(rejected)) => println!("rejected: {rejected}"),
        Err(CircuitError::Execution(e)) => println!("failed: {e}"),
    }
}
