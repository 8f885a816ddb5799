use crate::backoff::{ExponentialBackoff, IntervalFunction};
use crate::RetryScheduler;
use callguard_core::ConfigError;
use std::sync::Arc;
use std::time::Duration;

/// Default number of attempts per call, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default delay after the first failed attempt.
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);
/// Default ceiling for any single delay.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);
/// Default growth factor between delays.
pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// Builder for [`RetryScheduler`].
pub struct RetrySchedulerConfigBuilder {
    max_attempts: usize,
    min_wait: Duration,
    max_wait: Duration,
    multiplier: f64,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
}

impl Default for RetrySchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrySchedulerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - min_wait: 1s
    /// - max_wait: 10s
    /// - multiplier: 1.0
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_wait: DEFAULT_MIN_WAIT,
            max_wait: DEFAULT_MAX_WAIT,
            multiplier: DEFAULT_MULTIPLIER,
            interval_fn: None,
        }
    }

    /// Sets the maximum number of attempts.
    ///
    /// This includes the initial attempt, so max_attempts=3 means
    /// 1 initial attempt + 2 retries.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay after the first failed attempt.
    pub fn min_wait(mut self, min_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self
    }

    /// Sets the ceiling for any single delay.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the growth factor between consecutive delays.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Replaces the capped exponential shape with a custom interval function.
    ///
    /// `min_wait`, `max_wait` and `multiplier` are still validated but no
    /// longer shape the delays.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Builds the scheduler.
    ///
    /// # Errors
    /// - [`ConfigError::ZeroCount`] if `max_attempts` is zero
    /// - [`ConfigError::WaitBoundsInverted`] if `min_wait > max_wait`
    /// - [`ConfigError::InvalidMultiplier`] unless the multiplier is finite and positive
    pub fn build(self) -> Result<RetryScheduler, ConfigError> {
        let max_attempts = ConfigError::require_count("max_attempts", self.max_attempts)?;

        if self.min_wait > self.max_wait {
            return Err(ConfigError::WaitBoundsInverted {
                min_wait: self.min_wait,
                max_wait: self.max_wait,
            });
        }

        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }

        let (interval_fn, delay_ceiling): (Arc<dyn IntervalFunction>, _) = match self.interval_fn {
            Some(interval_fn) => (interval_fn, None),
            None => (
                Arc::new(
                    ExponentialBackoff::new(self.min_wait, self.max_wait)
                        .multiplier(self.multiplier),
                ),
                Some(self.max_wait),
            ),
        };

        Ok(RetryScheduler {
            max_attempts,
            delay_ceiling,
            interval_fn,
        })
    }
}
