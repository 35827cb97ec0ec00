//! Transition hooks
//!
//! Hooks run synchronously while the breaker updates its bookkeeping. With a
//! [`SharedCircuitBreaker`](crate::SharedCircuitBreaker) that means under its
//! lock, so a hook must not call back into the same breaker.

use std::fmt;
use std::sync::Arc;

/// Hook receiving the circuit name
pub type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Hooks fired on state transitions
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<Hook>,
    pub on_half_open: Option<Hook>,
    pub on_close: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn opened(&self, circuit: &str) {
        fire(&self.on_open, circuit);
    }

    pub(crate) fn half_opened(&self, circuit: &str) {
        fire(&self.on_half_open, circuit);
    }

    pub(crate) fn closed(&self, circuit: &str) {
        fire(&self.on_close, circuit);
    }
}

fn fire(hook: &Option<Hook>, circuit: &str) {
    if let Some(hook) = hook {
        hook(circuit);
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}
