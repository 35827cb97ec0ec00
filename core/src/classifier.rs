//! Failure classification
//!
//! Not every error means the dependency is unhealthy. A classifier decides
//! which errors are recorded in the failure window; the rest are handed back
//! to the caller without touching the breaker's state.

use std::any::Any;

/// What a classifier gets to look at
#[derive(Debug)]
pub struct FailureContext<'a> {
    /// Circuit name
    pub circuit_name: &'a str,
    /// The operation's error (downcast to inspect it)
    pub error: &'a dyn Any,
    /// How long the failed call took, in seconds on the breaker's clock
    pub duration: f64,
}

/// Decides whether an error counts toward opening the circuit
///
/// # Examples
///
/// ```rust
/// use breaker_guard::{FailureClassifier, FailureContext};
///
/// #[derive(Debug)]
/// struct HttpStatus(u16);
///
/// /// Client errors are the caller's fault, not the upstream's
/// #[derive(Debug)]
/// struct ServerErrorsOnly;
///
/// impl FailureClassifier for ServerErrorsOnly {
///     fn should_trip(&self, ctx: &FailureContext<'_>) -> bool {
///         ctx.error
///             .downcast_ref::<HttpStatus>()
///             .map_or(true, |status| status.0 >= 500)
///     }
/// }
/// ```
pub trait FailureClassifier: Send + Sync + std::fmt::Debug {
    /// `true` to record the error as a failure, `false` to ignore it
    fn should_trip(&self, ctx: &FailureContext<'_>) -> bool;
}

/// Records every error, the behavior without a classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn should_trip(&self, _: &FailureContext<'_>) -> bool {
        true
    }
}

/// Wraps a closure over [`FailureContext`]
pub struct PredicateClassifier<F>(F);

impl<F> PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self(predicate)
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn should_trip(&self, ctx: &FailureContext<'_>) -> bool {
        (self.0)(ctx)
    }
}

impl<F> std::fmt::Debug for PredicateClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PredicateClassifier(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum ServiceBehaviour {
        BadRequest,
        NotFound,
        Error,
        GatewayTimeout,
        RateLimited,
    }

    impl ServiceBehaviour {
        fn status(&self) -> u16 {
            match self {
                ServiceBehaviour::BadRequest => 400,
                ServiceBehaviour::NotFound => 404,
                ServiceBehaviour::Error => 500,
                ServiceBehaviour::GatewayTimeout => 504,
                ServiceBehaviour::RateLimited => 429,
            }
        }
    }

    fn ctx<'a>(error: &'a dyn Any, duration: f64) -> FailureContext<'a> {
        FailureContext {
            circuit_name: "flaky-service",
            error,
            duration,
        }
    }

    #[test]
    fn test_default_classifier_counts_everything() {
        let error = "any error";
        assert!(DefaultClassifier.should_trip(&ctx(&error, 0.1)));
    }

    #[test]
    fn test_predicate_on_duration() {
        let classifier = PredicateClassifier::new(|ctx| ctx.duration > 1.0);
        let error = "timeout";

        assert!(!classifier.should_trip(&ctx(&error, 0.5)));
        assert!(classifier.should_trip(&ctx(&error, 2.0)));
    }

    #[test]
    fn test_predicate_debug_hides_closure() {
        let classifier = PredicateClassifier::new(|_| false);
        assert_eq!(format!("{classifier:?}"), "PredicateClassifier(..)");
    }

    #[test]
    fn test_predicate_ignores_client_errors() {
        let classifier = PredicateClassifier::new(|ctx| {
            ctx.error
                .downcast_ref::<ServiceBehaviour>()
                .map_or(true, |behaviour| behaviour.status() >= 500)
        });

        for client_side in [
            ServiceBehaviour::BadRequest,
            ServiceBehaviour::NotFound,
            ServiceBehaviour::RateLimited,
        ] {
            assert!(
                !classifier.should_trip(&ctx(&client_side, 0.01)),
                "{client_side:?} should not count"
            );
        }

        assert!(classifier.should_trip(&ctx(&ServiceBehaviour::Error, 0.01)));
        assert!(classifier.should_trip(&ctx(&ServiceBehaviour::GatewayTimeout, 0.01)));

        // Unknown error types count
        let other = "connection reset";
        assert!(classifier.should_trip(&ctx(&other, 0.01)));
    }
}
