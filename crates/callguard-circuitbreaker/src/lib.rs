//! Per-destination circuit breaker.
//!
//! A circuit breaker stops a caller from hammering a destination that keeps
//! failing. One [`CircuitBreaker`] tracks every destination it has seen, each
//! with its own independent circuit created on first use.
//!
//! ## States
//! - **Closed**: attempts pass; consecutive failures are counted and a success
//!   resets the count. Reaching `failure_threshold` opens the circuit.
//! - **Open**: attempts are rejected until `recovery_timeout` has elapsed. The
//!   first admission after that moves to half-open and is itself a trial.
//! - **Half-Open**: up to `half_open_trial_budget` concurrent trials. A
//!   successful trial closes the circuit, a failed one reopens it.
//!
//! ```text
//! Closed --threshold--> Open --recovery timeout--> HalfOpen --success--> Closed
//!                        ^                            |
//!                        +-----------failure----------+
//! ```
//!
//! ## Usage
//!
//! The breaker does not run anything itself. Callers ask for admission before
//! an attempt and report the attempt's classification afterwards:
//!
//! ```rust
//! use callguard_circuitbreaker::{Admission, CircuitBreaker, CircuitState};
//! use callguard_core::{Classification, FailureReason};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(2)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .name("inventory")
//!     .build()
//!     .unwrap();
//!
//! let failed = Classification::RetryableFailure { reason: FailureReason::Status(503) };
//! for _ in 0..2 {
//!     if let Admission::Allowed(ticket) = breaker.admit("inventory-api") {
//!         breaker.record("inventory-api", ticket, &failed);
//!     }
//! }
//!
//! assert_eq!(breaker.state("inventory-api"), Some(CircuitState::Open));
//! assert_eq!(breaker.admit("inventory-api"), Admission::Rejected);
//! ```
//!
//! ## Concurrency
//!
//! `admit` and `record` for one destination are linearizable: each holds the
//! destination's registry entry locked for its whole read-modify-write.
//! Different destinations proceed independently. Events are delivered after the
//! entry is released, so listeners may call back into the breaker.
//!
//! ## Feature Flags
//! - `metrics`: state gauge, transition and admission counters via `metrics`
//! - `tracing`: structured logging via `tracing`
//! - `serde`: `Serialize` for [`CircuitState`] and [`CircuitSnapshot`]

use crate::circuit::{Circuit, Recorded, Transition};
use callguard_core::Classification;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;

pub use circuit::{Admission, CircuitSnapshot, CircuitState, Ticket};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;

mod circuit;
mod config;
mod events;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Circuit breakers for every destination a caller talks to.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuits: Arc<DashMap<String, Circuit>>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "circuitbreaker_calls_total",
                    "Total number of admission decisions and recorded results"
                );
                describe_counter!(
                    "circuitbreaker_transitions_total",
                    "Total number of circuit breaker state transitions"
                );
                describe_gauge!(
                    "circuitbreaker_state",
                    "Current state of a destination's circuit (0 closed, 1 open, 2 half-open)"
                );
            });
        }

        Self {
            circuits: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Returns a builder with default settings.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// The configuration shared by all destinations.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Asks whether an attempt against `destination` may proceed.
    ///
    /// Creates the destination's circuit on first use. An open circuit whose
    /// recovery timeout has elapsed moves to half-open here, and the returned
    /// ticket is a trial.
    pub fn admit(&self, destination: &str) -> Admission {
        let (admission, state, transition) = self.with_circuit(destination, |circuit| {
            let (admission, transition) = circuit.try_acquire(&self.config);
            #[cfg(feature = "metrics")]
            {
                if transition.is_some() {
                    self.report_state(destination, circuit.state());
                }
            }
            (admission, circuit.state(), transition)
        });

        if let Some(transition) = transition {
            self.on_transition(destination, transition);
        }

        match admission {
            Admission::Allowed(ticket) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    breaker = %self.config.name,
                    destination,
                    trial = ticket.is_trial(),
                    "circuit breaker permitted attempt"
                );

                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        name: self.config.name.clone(),
                        destination: destination.to_string(),
                        timestamp: Instant::now(),
                        state,
                        trial: ticket.is_trial(),
                    });
            }
            Admission::Rejected => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    breaker = %self.config.name,
                    destination,
                    state = state.as_str(),
                    "circuit breaker rejected attempt"
                );

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "rejected").increment(1);

                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        name: self.config.name.clone(),
                        destination: destination.to_string(),
                        timestamp: Instant::now(),
                        state,
                    });
            }
        }

        admission
    }

    /// Reports the classification of an admitted attempt.
    ///
    /// `Cancelled` releases the admission without counting as a success or a
    /// failure. Results for tickets issued before the circuit's last transition
    /// are ignored.
    pub fn record(&self, destination: &str, ticket: Ticket, classification: &Classification) {
        let Some((recorded, transition)) = self.circuits.get_mut(destination).map(|mut circuit| {
            let (recorded, transition) = circuit.on_result(&self.config, ticket, classification);
            #[cfg(feature = "metrics")]
            {
                if transition.is_some() {
                    self.report_state(destination, circuit.state());
                }
            }
            (recorded, transition)
        }) else {
            return;
        };

        match recorded {
            Recorded::Success(state) => {
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "success").increment(1);

                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::SuccessRecorded {
                        name: self.config.name.clone(),
                        destination: destination.to_string(),
                        timestamp: Instant::now(),
                        state,
                    });
            }
            Recorded::Failure(state, consecutive_failures) => {
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "failure").increment(1);

                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::FailureRecorded {
                        name: self.config.name.clone(),
                        destination: destination.to_string(),
                        timestamp: Instant::now(),
                        state,
                        consecutive_failures,
                    });
            }
            Recorded::Released | Recorded::Stale => {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    breaker = %self.config.name,
                    destination,
                    stale = matches!(recorded, Recorded::Stale),
                    "circuit breaker result not counted"
                );
            }
        }

        if let Some(transition) = transition {
            self.on_transition(destination, transition);
        }
    }

    /// Current mode of `destination`, or `None` if it has never been admitted.
    pub fn state(&self, destination: &str) -> Option<CircuitState> {
        self.circuits.get(destination).map(|circuit| circuit.state())
    }

    /// Snapshot of `destination`'s circuit.
    pub fn snapshot(&self, destination: &str) -> Option<CircuitSnapshot> {
        self.circuits.get(destination).map(|circuit| circuit.snapshot())
    }

    /// Every destination with a circuit.
    pub fn destinations(&self) -> Vec<String> {
        self.circuits.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of tracked destinations.
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    /// True if no destination has been admitted yet.
    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    fn with_circuit<R>(&self, destination: &str, f: impl FnOnce(&mut Circuit) -> R) -> R {
        if let Some(mut circuit) = self.circuits.get_mut(destination) {
            return f(&mut circuit);
        }
        let mut circuit = match self.circuits.entry(destination.to_string()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                let circuit = entry.insert(Circuit::new());
                #[cfg(feature = "metrics")]
                self.report_state(destination, circuit.state());
                circuit
            }
        };
        f(&mut circuit)
    }

    // Called with the destination's entry locked, so racing transitions
    // cannot leave the gauge behind the circuit.
    #[cfg(feature = "metrics")]
    fn report_state(&self, destination: &str, state: CircuitState) {
        gauge!(
            "circuitbreaker_state",
            "circuitbreaker" => self.config.name.clone(),
            "destination" => destination.to_string()
        )
        .set(state as u8 as f64);
    }

    fn on_transition(&self, destination: &str, transition: Transition) {
        let Transition { from, to } = transition;

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %self.config.name,
            destination,
            from = from.as_str(),
            to = to.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => self.config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
        }

        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                name: self.config.name.clone(),
                destination: destination.to_string(),
                timestamp: Instant::now(),
                from_state: from,
                to_state: to,
            });
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("destinations", &self.circuits.len())
            .finish()
    }
}
