//! Flat caller settings, as they appear in a configuration file.
//!
//! Durations are plain numbers of seconds. With the `serde` feature the struct
//! deserializes from any serde format; missing keys take their defaults.
//!
//! ```rust
//! use callguard::settings::CallerSettings;
//!
//! let settings = CallerSettings {
//!     timeout: 5.0,
//!     retry_multiplier: 2.0,
//!     ..CallerSettings::default()
//! };
//! let builder = settings.into_config().unwrap().name("search");
//! # let _ = builder;
//! ```

use crate::config::{ResilientCallConfigBuilder, DEFAULT_TIMEOUT};
use callguard_circuitbreaker::CircuitBreaker;
use callguard_core::ConfigError;
use callguard_retry::{
    RetryScheduler, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WAIT, DEFAULT_MIN_WAIT, DEFAULT_MULTIPLIER,
};

/// Settings for one [`ResilientCaller`](crate::ResilientCaller).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CallerSettings {
    /// Default attempt timeout, seconds.
    pub timeout: f64,
    /// Consecutive failures that open a destination's circuit.
    pub circuit_failure_threshold: usize,
    /// Seconds an open circuit waits before a trial.
    pub circuit_recovery_timeout: f64,
    /// Concurrent trials while half-open.
    pub half_open_trial_budget: usize,
    /// Attempts per call, the first one included.
    pub retry_attempts: usize,
    /// Backoff growth factor.
    pub retry_multiplier: f64,
    /// First backoff delay, seconds.
    pub retry_min_wait: f64,
    /// Backoff ceiling, seconds.
    pub retry_max_wait: f64,
}

impl Default for CallerSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT.as_secs_f64(),
            circuit_failure_threshold: 5,
            circuit_recovery_timeout: 30.0,
            half_open_trial_budget: 1,
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_multiplier: DEFAULT_MULTIPLIER,
            retry_min_wait: DEFAULT_MIN_WAIT.as_secs_f64(),
            retry_max_wait: DEFAULT_MAX_WAIT.as_secs_f64(),
        }
    }
}

impl CallerSettings {
    /// Validates the settings and turns them into a caller builder.
    ///
    /// The returned builder can still be given a name, listeners or a custom
    /// classifier before `build`.
    ///
    /// # Errors
    /// Returns the first invalid value as a [`ConfigError`].
    pub fn into_config(self) -> Result<ResilientCallConfigBuilder, ConfigError> {
        let breaker = CircuitBreaker::builder()
            .failure_threshold(self.circuit_failure_threshold)
            .recovery_timeout(ConfigError::seconds(
                "circuit_recovery_timeout",
                self.circuit_recovery_timeout,
            )?)
            .half_open_trial_budget(self.half_open_trial_budget)
            .build()?;

        let scheduler = RetryScheduler::builder()
            .max_attempts(self.retry_attempts)
            .multiplier(self.retry_multiplier)
            .min_wait(ConfigError::seconds("retry_min_wait", self.retry_min_wait)?)
            .max_wait(ConfigError::seconds("retry_max_wait", self.retry_max_wait)?)
            .build()?;

        Ok(ResilientCallConfigBuilder::new()
            .default_timeout(ConfigError::seconds("timeout", self.timeout)?)
            .circuit_breaker(breaker)
            .retry(scheduler))
    }
}
