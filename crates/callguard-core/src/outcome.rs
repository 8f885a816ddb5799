//! What one attempt produced, and what that means for the call.

use std::fmt;

/// Transport-level fault categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransportErrorKind {
    /// The attempt did not complete within its timeout.
    Timeout,
    /// The connection could not be established or was lost.
    Connection,
    /// The peer answered with something that is not a valid response.
    Protocol,
}

impl TransportErrorKind {
    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::Protocol => "protocol",
        }
    }
}

/// The raw result of a single attempt, as reported by the transport.
///
/// Produced once per attempt and never mutated. The transport translates every
/// native fault into one of these variants; nothing above it inspects a
/// transport-specific error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// A 2xx-style response.
    Ok {
        /// Response status.
        status_code: u16,
        /// Response body.
        body: Vec<u8>,
    },
    /// No usable response was obtained.
    TransportError {
        /// What went wrong.
        kind: TransportErrorKind,
    },
    /// A response was obtained but carries a non-success status.
    ApplicationError {
        /// Response status.
        status_code: u16,
        /// Response body.
        body: Vec<u8>,
    },
}

impl RawOutcome {
    /// Builds an outcome from a status code, choosing `Ok` for 2xx and
    /// `ApplicationError` for everything else.
    pub fn from_status(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        if (200..300).contains(&status_code) {
            RawOutcome::Ok { status_code, body }
        } else {
            RawOutcome::ApplicationError { status_code, body }
        }
    }

    /// A transport timeout.
    pub fn timeout() -> Self {
        RawOutcome::TransportError {
            kind: TransportErrorKind::Timeout,
        }
    }

    /// A connection failure.
    pub fn connection_error() -> Self {
        RawOutcome::TransportError {
            kind: TransportErrorKind::Connection,
        }
    }

    /// A malformed response.
    pub fn protocol_error() -> Self {
        RawOutcome::TransportError {
            kind: TransportErrorKind::Protocol,
        }
    }

    /// The status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RawOutcome::Ok { status_code, .. } | RawOutcome::ApplicationError { status_code, .. } => {
                Some(*status_code)
            }
            RawOutcome::TransportError { .. } => None,
        }
    }

    /// Consumes the outcome, returning the response body (empty for transport
    /// errors).
    pub fn into_body(self) -> Vec<u8> {
        match self {
            RawOutcome::Ok { body, .. } | RawOutcome::ApplicationError { body, .. } => body,
            RawOutcome::TransportError { .. } => Vec::new(),
        }
    }
}

/// Why an attempt failed: the status signal extracted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailureReason {
    /// A transport fault.
    Transport(TransportErrorKind),
    /// A non-success response status.
    Status(u16),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(kind) => write!(f, "transport {}", kind.as_str()),
            FailureReason::Status(code) => write!(f, "status {code}"),
        }
    }
}

/// The decision derived from a [`RawOutcome`].
///
/// The same value drives the retry decision and the circuit breaker, so the
/// two can never disagree about what a failure was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Classification {
    /// The attempt succeeded.
    Success,
    /// The attempt failed in a way another attempt may fix.
    RetryableFailure {
        /// What failed.
        reason: FailureReason,
    },
    /// The attempt failed in a way retrying will not fix.
    TerminalFailure {
        /// What failed.
        reason: FailureReason,
    },
    /// The caller abandoned the call. Never produced by a classifier.
    Cancelled,
}

impl Classification {
    /// True for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }

    /// True for `RetryableFailure`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Classification::RetryableFailure { .. })
    }

    /// True for either failure variant. `Cancelled` is not a failure of the
    /// destination and does not count.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Classification::RetryableFailure { .. } | Classification::TerminalFailure { .. }
        )
    }

    /// True for `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Classification::Cancelled)
    }

    /// The failure reason, if this is a failure.
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Classification::RetryableFailure { reason }
            | Classification::TerminalFailure { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Stable label used in events, logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::RetryableFailure { .. } => "retryable",
            Classification::TerminalFailure { .. } => "terminal",
            Classification::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} ({reason})", self.label()),
            None => f.write_str(self.label()),
        }
    }
}
