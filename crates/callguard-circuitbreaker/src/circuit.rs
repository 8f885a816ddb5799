use crate::config::CircuitBreakerConfig;
use callguard_core::Classification;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// The mode of one destination's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Attempts are admitted freely.
    Closed = 0,
    /// Attempts are rejected until the recovery timeout elapses.
    Open = 1,
    /// A bounded number of trial attempts test for recovery.
    HalfOpen = 2,
}

impl CircuitState {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Point-in-time view of one destination's circuit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitSnapshot {
    /// Current mode.
    pub state: CircuitState,
    /// Consecutive failures recorded while closed.
    pub consecutive_failures: usize,
    /// Trials admitted and not yet recorded while half-open.
    pub trials_in_flight: usize,
    /// Successful trials recorded in the current half-open period.
    pub trial_successes: usize,
    /// Time since the last transition (or since creation).
    pub time_since_state_change: Duration,
}

/// Proof of admission, handed back on [`record`](crate::CircuitBreaker::record).
///
/// The ticket remembers which circuit and which period of it admitted the
/// attempt, so a result that arrives after the circuit has moved on, or that
/// is recorded against another destination, cannot disturb the new mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub(crate) circuit: u64,
    pub(crate) epoch: u64,
    pub(crate) trial: bool,
}

impl Ticket {
    /// True if the attempt was admitted as a half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

/// The breaker's answer to an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The attempt may proceed; record its result with this ticket.
    Allowed(Ticket),
    /// The destination is considered unhealthy; do not attempt.
    Rejected,
}

impl Admission {
    /// True for `Allowed`.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// What `record` did, for event emission after the lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recorded {
    Success(CircuitState),
    Failure(CircuitState, usize),
    Released,
    Stale,
}

static NEXT_CIRCUIT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) struct Circuit {
    id: u64,
    state: CircuitState,
    epoch: u64,
    last_state_change: Instant,
    consecutive_failures: usize,
    trials_in_flight: usize,
    trial_successes: usize,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            id: NEXT_CIRCUIT_ID.fetch_add(1, Ordering::Relaxed),
            state: CircuitState::Closed,
            epoch: 0,
            last_state_change: Instant::now(),
            consecutive_failures: 0,
            trials_in_flight: 0,
            trial_successes: 0,
        }
    }
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            trials_in_flight: self.trials_in_flight,
            trial_successes: self.trial_successes,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    fn ticket(&self, trial: bool) -> Ticket {
        Ticket {
            circuit: self.id,
            epoch: self.epoch,
            trial,
        }
    }

    pub(crate) fn try_acquire(
        &mut self,
        config: &CircuitBreakerConfig,
    ) -> (Admission, Option<Transition>) {
        match self.state {
            CircuitState::Closed => (Admission::Allowed(self.ticket(false)), None),
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.recovery_timeout {
                    let transition = self.transition_to(CircuitState::HalfOpen);
                    self.trials_in_flight = 1;
                    (Admission::Allowed(self.ticket(true)), transition)
                } else {
                    (Admission::Rejected, None)
                }
            }
            CircuitState::HalfOpen => {
                if self.trials_in_flight < config.half_open_trial_budget {
                    self.trials_in_flight += 1;
                    (Admission::Allowed(self.ticket(true)), None)
                } else {
                    (Admission::Rejected, None)
                }
            }
        }
    }

    pub(crate) fn on_result(
        &mut self,
        config: &CircuitBreakerConfig,
        ticket: Ticket,
        classification: &Classification,
    ) -> (Recorded, Option<Transition>) {
        if ticket.circuit != self.id || ticket.epoch != self.epoch {
            return (Recorded::Stale, None);
        }

        match self.state {
            CircuitState::Closed => match classification {
                Classification::Success => {
                    self.consecutive_failures = 0;
                    (Recorded::Success(self.state), None)
                }
                Classification::RetryableFailure { .. } | Classification::TerminalFailure { .. } => {
                    self.consecutive_failures += 1;
                    let failures = self.consecutive_failures;
                    let transition = if failures >= config.failure_threshold {
                        self.transition_to(CircuitState::Open)
                    } else {
                        None
                    };
                    (Recorded::Failure(CircuitState::Closed, failures), transition)
                }
                Classification::Cancelled => (Recorded::Released, None),
            },
            // Open never issues tickets, so a current-epoch ticket cannot exist.
            CircuitState::Open => (Recorded::Stale, None),
            CircuitState::HalfOpen => {
                self.trials_in_flight = self.trials_in_flight.saturating_sub(1);
                match classification {
                    Classification::Success => {
                        self.trial_successes += 1;
                        let transition = if self.trial_successes >= config.successes_to_close {
                            self.transition_to(CircuitState::Closed)
                        } else {
                            None
                        };
                        (Recorded::Success(CircuitState::HalfOpen), transition)
                    }
                    Classification::RetryableFailure { .. }
                    | Classification::TerminalFailure { .. } => {
                        let transition = self.transition_to(CircuitState::Open);
                        (Recorded::Failure(CircuitState::HalfOpen, 1), transition)
                    }
                    Classification::Cancelled => (Recorded::Released, None),
                }
            }
        }
    }

    fn transition_to(&mut self, state: CircuitState) -> Option<Transition> {
        if self.state == state {
            return None;
        }

        let from = self.state;
        self.state = state;
        self.epoch += 1;
        self.last_state_change = Instant::now();
        self.consecutive_failures = 0;
        self.trials_in_flight = 0;
        self.trial_successes = 0;

        Some(Transition { from, to: state })
    }
}
