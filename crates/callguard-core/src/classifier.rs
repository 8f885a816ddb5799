//! Error classification for retry and circuit breaker decisions.
//!
//! The classifier is the single place that decides whether a raw outcome is a
//! success, a failure worth retrying, or a failure that retrying cannot fix.
//! The retry scheduler and the circuit breaker both consume its verdict; neither
//! looks at status codes on its own.

use crate::outcome::{Classification, FailureReason, RawOutcome, TransportErrorKind};
use std::sync::Arc;

/// Maps a [`RawOutcome`] to a [`Classification`].
///
/// Implementations must be deterministic and free of side effects. They never
/// return [`Classification::Cancelled`].
pub trait ErrorClassifier: Send + Sync {
    /// Classifies one attempt's outcome.
    fn classify(&self, outcome: &RawOutcome) -> Classification;
}

/// The standard policy for HTTP-style destinations.
///
/// | Outcome                          | Classification   |
/// |----------------------------------|------------------|
/// | `Ok`                             | Success          |
/// | transport timeout / connection   | RetryableFailure |
/// | transport protocol               | TerminalFailure  |
/// | status >= 500, or 429            | RetryableFailure |
/// | any other non-success status     | TerminalFailure  |
///
/// ```rust
/// use callguard_core::{Classification, DefaultClassifier, ErrorClassifier, RawOutcome};
///
/// let classifier = DefaultClassifier;
/// assert!(classifier.classify(&RawOutcome::from_status(503, Vec::new())).is_retryable());
/// assert!(matches!(
///     classifier.classify(&RawOutcome::from_status(404, Vec::new())),
///     Classification::TerminalFailure { .. }
/// ));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl DefaultClassifier {
    /// Whether a non-success status is worth another attempt.
    pub fn is_retryable_status(status_code: u16) -> bool {
        status_code >= 500 || status_code == 429
    }
}

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, outcome: &RawOutcome) -> Classification {
        match outcome {
            RawOutcome::Ok { .. } => Classification::Success,
            RawOutcome::TransportError { kind } => {
                let reason = FailureReason::Transport(*kind);
                match kind {
                    TransportErrorKind::Timeout | TransportErrorKind::Connection => {
                        Classification::RetryableFailure { reason }
                    }
                    TransportErrorKind::Protocol => Classification::TerminalFailure { reason },
                }
            }
            RawOutcome::ApplicationError { status_code, .. } => {
                let reason = FailureReason::Status(*status_code);
                if Self::is_retryable_status(*status_code) {
                    Classification::RetryableFailure { reason }
                } else {
                    Classification::TerminalFailure { reason }
                }
            }
        }
    }
}

/// A classifier backed by a closure.
///
/// Useful when a destination has its own notion of retryability, e.g. an API
/// that signals overload with `409`:
///
/// ```rust
/// use callguard_core::{
///     Classification, DefaultClassifier, ErrorClassifier, FailureReason, FnClassifier, RawOutcome,
/// };
///
/// let classifier = FnClassifier::new(|outcome: &RawOutcome| match outcome {
///     RawOutcome::ApplicationError { status_code: 409, .. } => Classification::RetryableFailure {
///         reason: FailureReason::Status(409),
///     },
///     other => DefaultClassifier.classify(other),
/// });
///
/// assert!(classifier.classify(&RawOutcome::from_status(409, Vec::new())).is_retryable());
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps `f` as a classifier.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F> ErrorClassifier for FnClassifier<F>
where
    F: Fn(&RawOutcome) -> Classification + Send + Sync,
{
    fn classify(&self, outcome: &RawOutcome) -> Classification {
        (self.f)(outcome)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
