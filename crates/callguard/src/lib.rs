//! Resilient outbound calls.
//!
//! `callguard` runs a call against an injected [`Transport`] with three
//! guarantees:
//!
//! - every attempt is bounded by a timeout ([`Attempt`]);
//! - retryable failures are retried with capped backoff ([`RetryScheduler`]);
//! - a per-destination circuit breaker fast-fails destinations that keep
//!   failing ([`CircuitBreaker`]).
//!
//! All three are driven by one [`Classification`] per attempt, produced by an
//! [`ErrorClassifier`]. The retry decision and the breaker never disagree about
//! what a failure was.
//!
//! # Quick start
//!
//! ```rust
//! use callguard::transport::transport_fn;
//! use callguard::{CallDescriptor, CallResult, RawOutcome, ResilientCaller, Url};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let caller = ResilientCaller::builder()
//!     .name("catalog")
//!     .build(transport_fn(|_call, _timeout, _cancel| async {
//!         RawOutcome::from_status(200, br#"{"items": []}"#.to_vec())
//!     }))
//!     .unwrap();
//!
//! let call = CallDescriptor::get(Url::parse("https://catalog.example.com/items").unwrap());
//! let result = caller.call(call).await;
//!
//! assert!(result.is_success());
//! assert_eq!(result.summary().data, Some(serde_json::json!({"items": []})));
//! # }
//! ```
//!
//! # How a call runs
//!
//! 1. The breaker is asked to admit the call's destination. A rejection ends
//!    the call with [`CallResult::RejectedByBreaker`] without touching the
//!    transport.
//! 2. One attempt runs with the call's timeout (or the caller's default).
//! 3. The outcome is classified and the classification recorded with the
//!    breaker.
//! 4. A success ends the call. A retryable failure with attempts left sleeps
//!    the backoff delay and goes back to step 1, so a breaker that opened in
//!    the meantime stops the retries. Anything else ends the call with
//!    [`CallResult::Failed`].
//!
//! # Cancellation
//!
//! [`ResilientCaller::call_with_cancel`] and
//! [`ResilientCaller::call_with_deadline`] stop the call while an attempt is in
//! flight or during backoff. The in-flight attempt is dropped, its cancellation
//! token fires, the breaker admission is released without counting, and
//! `Failed { classification: Cancelled, .. }` is returned. Dropping the call
//! future releases the admission the same way.
//!
//! # Tower
//!
//! [`ResilientCaller`] is a `tower::Service<CallDescriptor>` that never errors,
//! and [`ResilientCallLayer`] wraps any `Service<AttemptRequest>` transport.
//!
//! # Feature Flags
//! - `tracing` (default): structured logging, plus [`logging::TracingSink`]
//! - `metrics`: attempt, call and breaker metrics via `metrics`
//! - `serde`: `Serialize` for [`CallSummary`], `Deserialize` for
//!   [`settings::CallerSettings`]

use callguard_circuitbreaker::{Admission, Ticket};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::Service;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub use attempt::Attempt;
pub use callguard_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerEvent,
    CircuitSnapshot, CircuitState,
};
pub use callguard_core::{
    CallDescriptor, Classification, ConfigError, DefaultClassifier, ErrorClassifier,
    EventListener, EventListeners, FailureReason, FnClassifier, FnListener, Method,
    ParseMethodError, RawOutcome, ResilienceEvent, TransportErrorKind,
};
pub use callguard_retry::{
    ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction, RetryScheduler,
    RetrySchedulerConfigBuilder,
};
pub use config::{ResilientCallConfig, ResilientCallConfigBuilder, DEFAULT_TIMEOUT};
pub use events::{CallEvent, CallOutcome};
pub use layer::ResilientCallLayer;
pub use result::{CallResult, CallSummary, ErrorCode};
pub use transport::{AttemptRequest, ServiceTransport, Transport};
pub use url::Url;

pub mod settings;
pub mod transport;

#[cfg(feature = "tracing")]
pub mod logging;

mod attempt;
mod config;
mod events;
mod layer;
mod result;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Runs calls with timeouts, retries and per-destination circuit breaking.
///
/// Cloning is cheap; clones share the breaker and the transport.
#[derive(Clone)]
pub struct ResilientCaller {
    attempt: Attempt,
    config: Arc<ResilientCallConfig>,
}

impl ResilientCaller {
    /// Creates a new builder with default settings.
    pub fn builder() -> ResilientCallConfigBuilder {
        ResilientCallConfigBuilder::new()
    }

    pub(crate) fn new(transport: Arc<dyn Transport>, config: Arc<ResilientCallConfig>) -> Self {
        #[cfg(feature = "metrics")]
        {
            METRICS_INIT.call_once(|| {
                describe_counter!(
                    "callguard_attempts_total",
                    "Total number of attempts by classification"
                );
                describe_counter!("callguard_calls_total", "Total number of calls by result");
                describe_histogram!(
                    "callguard_attempt_duration_seconds",
                    "Duration of individual attempts"
                );
            });
        }

        Self {
            attempt: Attempt::new(transport),
            config,
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The breaker gating this caller's destinations.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.config.breaker
    }

    /// The retry policy.
    pub fn scheduler(&self) -> &RetryScheduler {
        &self.config.scheduler
    }

    /// Attempt timeout for calls without an override.
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    /// Runs `call` to completion.
    pub async fn call(&self, call: CallDescriptor) -> CallResult {
        self.run(call, CancellationToken::new(), None).await
    }

    /// Runs `call` until it completes or `cancel` fires.
    pub async fn call_with_cancel(
        &self,
        call: CallDescriptor,
        cancel: CancellationToken,
    ) -> CallResult {
        self.run(call, cancel, None).await
    }

    /// Runs `call` until it completes or `deadline` passes.
    ///
    /// Reaching the deadline is reported as a cancellation.
    pub async fn call_with_deadline(&self, call: CallDescriptor, deadline: Instant) -> CallResult {
        self.run(call, CancellationToken::new(), Some(deadline)).await
    }

    async fn run(
        &self,
        call: CallDescriptor,
        cancel: CancellationToken,
        deadline: Option<Instant>,
    ) -> CallResult {
        let config = &self.config;
        let call = Arc::new(call);
        let destination = call.destination_key();
        let timeout = call.effective_timeout(config.default_timeout);
        let mut attempt = 0;

        if is_interrupted(&cancel, deadline) {
            return self.finish(destination, CallResult::cancelled(attempt));
        }

        loop {
            let ticket = match config.breaker.admit(destination) {
                Admission::Allowed(ticket) => ticket,
                Admission::Rejected => {
                    return self.finish(
                        destination,
                        CallResult::RejectedByBreaker {
                            destination: destination.to_string(),
                            attempts_made: attempt,
                        },
                    );
                }
            };
            let admission = AdmissionGuard::new(&config.breaker, destination, ticket);
            attempt += 1;

            config.event_listeners.emit(&CallEvent::AttemptStarted {
                name: config.name.clone(),
                destination: destination.to_string(),
                timestamp: std::time::Instant::now(),
                attempt,
                trial: ticket.is_trial(),
            });

            let attempt_cancel = cancel.child_token();
            let started = Instant::now();
            let execution = self
                .attempt
                .run(Arc::clone(&call), timeout, attempt_cancel.clone());

            let Some(outcome) = interruptible(execution, &cancel, deadline).await else {
                attempt_cancel.cancel();
                admission.release(&Classification::Cancelled);
                self.on_attempt_finished(destination, attempt, Classification::Cancelled, started.elapsed());
                return self.finish(destination, CallResult::cancelled(attempt));
            };

            let classification = config.classifier.classify(&outcome);
            admission.release(&classification);
            self.on_attempt_finished(destination, attempt, classification, started.elapsed());

            if classification.is_success() {
                let status_code = outcome.status_code();
                return self.finish(
                    destination,
                    CallResult::Success {
                        body: outcome.into_body(),
                        status_code,
                        attempts: attempt,
                    },
                );
            }

            if !config.scheduler.should_retry(attempt, &classification) {
                return self.finish(
                    destination,
                    CallResult::Failed {
                        classification,
                        attempts_made: attempt,
                    },
                );
            }

            let delay = config.scheduler.next_delay(attempt);

            #[cfg(feature = "tracing")]
            debug!(
                caller = %config.name,
                destination,
                attempt,
                classification = %classification,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );

            config.event_listeners.emit(&CallEvent::RetryScheduled {
                name: config.name.clone(),
                destination: destination.to_string(),
                timestamp: std::time::Instant::now(),
                attempt,
                classification,
                delay,
            });

            if interruptible(tokio::time::sleep(delay), &cancel, deadline)
                .await
                .is_none()
            {
                return self.finish(destination, CallResult::cancelled(attempt));
            }
        }
    }

    fn on_attempt_finished(
        &self,
        destination: &str,
        attempt: usize,
        classification: Classification,
        duration: Duration,
    ) {
        #[cfg(feature = "metrics")]
        {
            counter!(
                "callguard_attempts_total",
                "caller" => self.config.name.clone(),
                "classification" => classification.label()
            )
            .increment(1);
            histogram!("callguard_attempt_duration_seconds", "caller" => self.config.name.clone())
                .record(duration.as_secs_f64());
        }

        self.config
            .event_listeners
            .emit(&CallEvent::AttemptFinished {
                name: self.config.name.clone(),
                destination: destination.to_string(),
                timestamp: std::time::Instant::now(),
                attempt,
                classification,
                duration,
            });
    }

    fn finish(&self, destination: &str, result: CallResult) -> CallResult {
        let outcome = match &result {
            CallResult::Success { .. } => CallOutcome::Success,
            CallResult::RejectedByBreaker { .. } => CallOutcome::Rejected,
            CallResult::Failed {
                classification: Classification::Cancelled,
                ..
            } => CallOutcome::Cancelled,
            CallResult::Failed { .. } => CallOutcome::Failed,
        };

        #[cfg(feature = "tracing")]
        match outcome {
            CallOutcome::Failed => warn!(
                caller = %self.config.name,
                destination,
                attempts = result.attempts_made(),
                classification = ?result.classification(),
                "call failed"
            ),
            CallOutcome::Rejected => debug!(
                caller = %self.config.name,
                destination,
                attempts = result.attempts_made(),
                "call rejected by circuit breaker"
            ),
            CallOutcome::Cancelled => debug!(
                caller = %self.config.name,
                destination,
                attempts = result.attempts_made(),
                "call cancelled"
            ),
            CallOutcome::Success => {}
        }

        #[cfg(feature = "metrics")]
        counter!(
            "callguard_calls_total",
            "caller" => self.config.name.clone(),
            "result" => outcome.as_str()
        )
        .increment(1);

        self.config.event_listeners.emit(&CallEvent::CallFinished {
            name: self.config.name.clone(),
            destination: destination.to_string(),
            timestamp: std::time::Instant::now(),
            outcome,
            attempts_made: result.attempts_made(),
            classification: result.classification(),
        });

        result
    }
}

impl std::fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("name", &self.config.name)
            .field("breaker", &self.config.breaker)
            .field("scheduler", &self.config.scheduler)
            .field("default_timeout", &self.config.default_timeout)
            .finish()
    }
}

impl Service<CallDescriptor> for ResilientCaller {
    type Response = CallResult;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<CallResult, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: CallDescriptor) -> Self::Future {
        let caller = self.clone();
        Box::pin(async move { Ok(caller.run(call, CancellationToken::new(), None).await) })
    }
}

impl CallResult {
    fn cancelled(attempts_made: usize) -> Self {
        CallResult::Failed {
            classification: Classification::Cancelled,
            attempts_made,
        }
    }
}

/// Holds a breaker admission until its classification is recorded.
///
/// Dropped without a record (the call future was dropped mid-attempt), it
/// records `Cancelled` so a half-open trial slot is never leaked.
struct AdmissionGuard<'a> {
    breaker: &'a CircuitBreaker,
    destination: &'a str,
    ticket: Option<Ticket>,
}

impl<'a> AdmissionGuard<'a> {
    fn new(breaker: &'a CircuitBreaker, destination: &'a str, ticket: Ticket) -> Self {
        Self {
            breaker,
            destination,
            ticket: Some(ticket),
        }
    }

    fn release(mut self, classification: &Classification) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record(self.destination, ticket, classification);
        }
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker
                .record(self.destination, ticket, &Classification::Cancelled);
        }
    }
}

fn is_interrupted(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Drives `fut` unless the token fires or the deadline passes first.
async fn interruptible<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Option<F::Output> {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = expired => None,
        output = fut => Some(output),
    }
}
