//! Construction-time errors.
//!
//! Configuration is the only place a callguard component can refuse to work:
//! every builder validates its inputs in `build()` and returns [`ConfigError`]
//! instead of producing a half-valid component. Once built, nothing in the call
//! path returns an error; faults are reported inside the call result.

use std::time::Duration;
use thiserror::Error;

/// An invalid configuration value, rejected before any call is accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A count that must be at least one was zero.
    #[error("{field} must be at least 1")]
    ZeroCount {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending setting.
        field: &'static str,
    },

    /// The backoff floor is above the backoff ceiling.
    #[error("min_wait ({min_wait:?}) must not exceed max_wait ({max_wait:?})")]
    WaitBoundsInverted {
        /// Configured floor.
        min_wait: Duration,
        /// Configured ceiling.
        max_wait: Duration,
    },

    /// The backoff multiplier is zero, negative, or not finite.
    #[error("multiplier must be a finite number greater than zero, got {0}")]
    InvalidMultiplier(f64),

    /// A duration given in seconds could not be represented.
    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidSeconds {
        /// Name of the offending setting.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl ConfigError {
    /// Rejects `value == 0`.
    pub fn require_count(field: &'static str, value: usize) -> Result<usize, ConfigError> {
        if value == 0 {
            Err(ConfigError::ZeroCount { field })
        } else {
            Ok(value)
        }
    }

    /// Rejects a zero duration.
    pub fn require_duration(field: &'static str, value: Duration) -> Result<Duration, ConfigError> {
        if value.is_zero() {
            Err(ConfigError::ZeroDuration { field })
        } else {
            Ok(value)
        }
    }

    /// Converts a seconds value into a [`Duration`], rejecting NaN, infinities
    /// and negative numbers.
    pub fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidSeconds { field, value })
    }
}
