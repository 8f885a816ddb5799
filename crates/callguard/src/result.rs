//! What a call returns.

use callguard_core::{Classification, FailureReason, TransportErrorKind};
use serde_json::Value;

/// The outcome of one resilient call.
///
/// Every call produces exactly one of these; faults never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    /// An attempt was classified as a success.
    Success {
        /// Response body of the successful attempt.
        body: Vec<u8>,
        /// Response status, if the transport produced one.
        status_code: Option<u16>,
        /// Attempts made, the successful one included.
        attempts: usize,
    },
    /// The call gave up.
    ///
    /// `classification` is the last attempt's classification, or
    /// [`Classification::Cancelled`] when the caller cancelled.
    Failed {
        classification: Classification,
        attempts_made: usize,
    },
    /// The destination's circuit refused an attempt; the transport was not
    /// invoked for it.
    RejectedByBreaker {
        destination: String,
        /// Attempts completed before the rejection.
        attempts_made: usize,
    },
}

impl CallResult {
    /// True for [`CallResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success { .. })
    }

    /// True for a failure caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CallResult::Failed {
                classification: Classification::Cancelled,
                ..
            }
        )
    }

    /// True for [`CallResult::RejectedByBreaker`].
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallResult::RejectedByBreaker { .. })
    }

    /// Attempts that reached the transport.
    pub fn attempts_made(&self) -> usize {
        match self {
            CallResult::Success { attempts, .. } => *attempts,
            CallResult::Failed { attempts_made, .. }
            | CallResult::RejectedByBreaker { attempts_made, .. } => *attempts_made,
        }
    }

    /// Classification of a failed call.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            CallResult::Failed { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    /// Body of a successful call.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            CallResult::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Flattens the result into the response shape handed to API consumers.
    ///
    /// A successful body is parsed as JSON; a body that is not JSON becomes
    /// `{"text": ..., "status_code": ...}`.
    pub fn summary(&self) -> CallSummary {
        match self {
            CallResult::Success {
                body, status_code, ..
            } => {
                let data = serde_json::from_slice(body).unwrap_or_else(|_| {
                    serde_json::json!({
                        "text": String::from_utf8_lossy(body),
                        "status_code": status_code,
                    })
                });
                CallSummary {
                    success: true,
                    data: Some(data),
                    status_code: *status_code,
                    error: None,
                    message: None,
                }
            }
            CallResult::RejectedByBreaker { .. } => CallSummary {
                success: false,
                data: None,
                status_code: None,
                error: Some(ErrorCode::CircuitBreakerOpen.to_string()),
                message: Some("Service temporarily unavailable".to_string()),
            },
            CallResult::Failed { classification, .. } => {
                let status_code = match classification.reason() {
                    Some(FailureReason::Status(code)) => Some(code),
                    _ => None,
                };
                CallSummary {
                    success: false,
                    data: None,
                    status_code,
                    error: Some(ErrorCode::from_classification(classification).to_string()),
                    message: Some(classification.to_string()),
                }
            }
        }
    }
}

/// Flat, serializable view of a [`CallResult`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CallSummary {
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub data: Option<Value>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub status_code: Option<u16>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub message: Option<String>,
}

/// Machine-readable error codes used in [`CallSummary::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CircuitBreakerOpen,
    Http(u16),
    Timeout,
    ConnectionError,
    ProtocolError,
    Cancelled,
}

impl ErrorCode {
    fn from_classification(classification: &Classification) -> Self {
        match classification.reason() {
            Some(FailureReason::Status(code)) => ErrorCode::Http(code),
            Some(FailureReason::Transport(TransportErrorKind::Timeout)) => ErrorCode::Timeout,
            Some(FailureReason::Transport(TransportErrorKind::Connection)) => {
                ErrorCode::ConnectionError
            }
            Some(FailureReason::Transport(TransportErrorKind::Protocol)) => {
                ErrorCode::ProtocolError
            }
            None => ErrorCode::Cancelled,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::CircuitBreakerOpen => f.write_str("CIRCUIT_BREAKER_OPEN"),
            ErrorCode::Http(code) => write!(f, "HTTP_{code}"),
            ErrorCode::Timeout => f.write_str("TIMEOUT"),
            ErrorCode::ConnectionError => f.write_str("CONNECTION_ERROR"),
            ErrorCode::ProtocolError => f.write_str("PROTOCOL_ERROR"),
            ErrorCode::Cancelled => f.write_str("CANCELLED"),
        }
    }
}
