use crate::CircuitState;
use callguard_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// An attempt was admitted.
    CallPermitted {
        name: String,
        destination: String,
        timestamp: Instant,
        state: CircuitState,
        trial: bool,
    },
    /// An attempt was refused.
    CallRejected {
        name: String,
        destination: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A destination's circuit changed mode.
    StateTransition {
        name: String,
        destination: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful attempt was recorded.
    SuccessRecorded {
        name: String,
        destination: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failed attempt was recorded.
    FailureRecorded {
        name: String,
        destination: String,
        timestamp: Instant,
        state: CircuitState,
        consecutive_failures: usize,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn instance_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { name, .. }
            | CircuitBreakerEvent::CallRejected { name, .. }
            | CircuitBreakerEvent::StateTransition { name, .. }
            | CircuitBreakerEvent::SuccessRecorded { name, .. }
            | CircuitBreakerEvent::FailureRecorded { name, .. } => name,
        }
    }

    fn destination(&self) -> Option<&str> {
        match self {
            CircuitBreakerEvent::CallPermitted { destination, .. }
            | CircuitBreakerEvent::CallRejected { destination, .. }
            | CircuitBreakerEvent::StateTransition { destination, .. }
            | CircuitBreakerEvent::SuccessRecorded { destination, .. }
            | CircuitBreakerEvent::FailureRecorded { destination, .. } => Some(destination),
        }
    }
}
