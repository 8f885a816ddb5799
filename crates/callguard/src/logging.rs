//! Event listener that writes call and breaker events to `tracing`.

use crate::events::{CallEvent, CallOutcome};
use callguard_circuitbreaker::CircuitBreakerEvent;
use callguard_core::EventListener;
use tracing::{debug, info, trace, warn};

/// Writes every event it receives as a structured `tracing` event.
///
/// Attempt starts log at `trace`, attempt results, retries and breaker
/// admissions at `debug`, breaker transitions at `info`, failed calls at
/// `warn`.
///
/// ```rust
/// use callguard::logging::TracingSink;
/// use callguard::{CircuitBreakerConfig, ResilientCaller};
///
/// let breaker = CircuitBreakerConfig::builder().listener(TracingSink).build().unwrap();
/// let builder = ResilientCaller::builder()
///     .circuit_breaker(breaker)
///     .listener(TracingSink);
/// # let _ = builder;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventListener<CallEvent> for TracingSink {
    fn on_event(&self, event: &CallEvent) {
        match event {
            CallEvent::AttemptStarted {
                name,
                destination,
                attempt,
                trial,
                ..
            } => trace!(caller = %name, %destination, attempt, trial, "attempt started"),
            CallEvent::AttemptFinished {
                name,
                destination,
                attempt,
                classification,
                duration,
                ..
            } => debug!(
                caller = %name,
                %destination,
                attempt,
                classification = classification.label(),
                duration_ms = duration.as_millis() as u64,
                "attempt finished"
            ),
            CallEvent::RetryScheduled {
                name,
                destination,
                attempt,
                classification,
                delay,
                ..
            } => debug!(
                caller = %name,
                %destination,
                attempt,
                classification = classification.label(),
                delay_ms = delay.as_millis() as u64,
                "retry scheduled"
            ),
            CallEvent::CallFinished {
                name,
                destination,
                outcome,
                attempts_made,
                classification,
                ..
            } => {
                let classification = classification.map(|c| c.label()).unwrap_or("none");
                match outcome {
                    CallOutcome::Failed => warn!(
                        caller = %name,
                        %destination,
                        attempts = attempts_made,
                        classification,
                        "call finished"
                    ),
                    _ => debug!(
                        caller = %name,
                        %destination,
                        result = outcome.as_str(),
                        attempts = attempts_made,
                        classification,
                        "call finished"
                    ),
                }
            }
        }
    }
}

impl EventListener<CircuitBreakerEvent> for TracingSink {
    fn on_event(&self, event: &CircuitBreakerEvent) {
        match event {
            CircuitBreakerEvent::StateTransition {
                name,
                destination,
                from_state,
                to_state,
                ..
            } => info!(
                breaker = %name,
                %destination,
                from = from_state.as_str(),
                to = to_state.as_str(),
                "circuit state transition"
            ),
            CircuitBreakerEvent::CallRejected {
                name,
                destination,
                state,
                ..
            } => debug!(breaker = %name, %destination, state = state.as_str(), "admission rejected"),
            CircuitBreakerEvent::CallPermitted {
                name,
                destination,
                trial,
                ..
            } => trace!(breaker = %name, %destination, trial, "admission granted"),
            CircuitBreakerEvent::SuccessRecorded {
                name, destination, ..
            } => trace!(breaker = %name, %destination, "success recorded"),
            CircuitBreakerEvent::FailureRecorded {
                name,
                destination,
                consecutive_failures,
                ..
            } => debug!(
                breaker = %name,
                %destination,
                consecutive_failures,
                "failure recorded"
            ),
        }
    }
}
