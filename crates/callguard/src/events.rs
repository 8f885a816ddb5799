use callguard_core::{Classification, ResilienceEvent};
use std::time::{Duration, Instant};

/// How a call ended, as reported in [`CallEvent::CallFinished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// A success was returned.
    Success,
    /// A classified failure was returned.
    Failed,
    /// The breaker refused an attempt.
    Rejected,
    /// The caller cancelled or the deadline passed.
    Cancelled,
}

impl CallOutcome {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failed => "failed",
            CallOutcome::Rejected => "rejected",
            CallOutcome::Cancelled => "cancelled",
        }
    }
}

/// Events emitted while a call runs.
///
/// Every event carries the caller name and destination key; attempt events
/// also carry the 1-based attempt index.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// An attempt was admitted and is about to run.
    AttemptStarted {
        name: String,
        destination: String,
        timestamp: Instant,
        attempt: usize,
        trial: bool,
    },
    /// An attempt completed and was classified.
    AttemptFinished {
        name: String,
        destination: String,
        timestamp: Instant,
        attempt: usize,
        classification: Classification,
        duration: Duration,
    },
    /// Another attempt will follow after `delay`.
    RetryScheduled {
        name: String,
        destination: String,
        timestamp: Instant,
        attempt: usize,
        classification: Classification,
        delay: Duration,
    },
    /// The call ended and its result is being returned.
    CallFinished {
        name: String,
        destination: String,
        timestamp: Instant,
        outcome: CallOutcome,
        attempts_made: usize,
        classification: Option<Classification>,
    },
}

impl ResilienceEvent for CallEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CallEvent::AttemptStarted { .. } => "attempt_started",
            CallEvent::AttemptFinished { .. } => "attempt_finished",
            CallEvent::RetryScheduled { .. } => "retry_scheduled",
            CallEvent::CallFinished { .. } => "call_finished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CallEvent::AttemptStarted { timestamp, .. }
            | CallEvent::AttemptFinished { timestamp, .. }
            | CallEvent::RetryScheduled { timestamp, .. }
            | CallEvent::CallFinished { timestamp, .. } => *timestamp,
        }
    }

    fn instance_name(&self) -> &str {
        match self {
            CallEvent::AttemptStarted { name, .. }
            | CallEvent::AttemptFinished { name, .. }
            | CallEvent::RetryScheduled { name, .. }
            | CallEvent::CallFinished { name, .. } => name,
        }
    }

    fn destination(&self) -> Option<&str> {
        match self {
            CallEvent::AttemptStarted { destination, .. }
            | CallEvent::AttemptFinished { destination, .. }
            | CallEvent::RetryScheduled { destination, .. }
            | CallEvent::CallFinished { destination, .. } => Some(destination),
        }
    }
}

impl CallEvent {
    /// The attempt index, for attempt-level events.
    pub fn attempt(&self) -> Option<usize> {
        match self {
            CallEvent::AttemptStarted { attempt, .. }
            | CallEvent::AttemptFinished { attempt, .. }
            | CallEvent::RetryScheduled { attempt, .. } => Some(*attempt),
            CallEvent::CallFinished { .. } => None,
        }
    }

    /// The classification the event reports, if any.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            CallEvent::AttemptFinished { classification, .. }
            | CallEvent::RetryScheduled { classification, .. } => Some(*classification),
            CallEvent::CallFinished { classification, .. } => *classification,
            CallEvent::AttemptStarted { .. } => None,
        }
    }
}
