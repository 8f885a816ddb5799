//! Retry scheduling for callguard.
//!
//! [`RetryScheduler`] answers two questions for the caller after each failed
//! attempt: *should there be another attempt?* and *how long to wait first?*
//! It holds no per-call state; the attempt counter lives with the call.
//!
//! Only a [`Classification::RetryableFailure`] is ever retried. Terminal
//! failures, cancellations and breaker rejections end the call.
//!
//! # Backoff
//!
//! The delay after attempt `n` is `min(max_wait, min_wait * multiplier^(n-1))`.
//! No jitter is applied. A multiplier of `1.0` (the default) keeps every delay
//! at `min_wait`:
//!
//! ```rust
//! use callguard_retry::RetryScheduler;
//! use std::time::Duration;
//!
//! let scheduler = RetryScheduler::builder()
//!     .max_attempts(6)
//!     .min_wait(Duration::from_secs(1))
//!     .multiplier(2.0)
//!     .max_wait(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! let delays: Vec<u64> = (1..6).map(|n| scheduler.next_delay(n).as_secs()).collect();
//! assert_eq!(delays, vec![1, 2, 4, 8, 10]);
//! ```
//!
//! Other shapes plug in through [`IntervalFunction`]:
//!
//! ```rust
//! use callguard_retry::{FixedInterval, RetryScheduler};
//! use std::time::Duration;
//!
//! let scheduler = RetryScheduler::builder()
//!     .backoff(FixedInterval::new(Duration::from_millis(50)))
//!     .build()
//!     .unwrap();
//! assert_eq!(scheduler.next_delay(2), Duration::from_millis(50));
//! ```

use callguard_core::Classification;
use std::sync::Arc;
use std::time::Duration;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use config::{
    RetrySchedulerConfigBuilder, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WAIT, DEFAULT_MIN_WAIT,
    DEFAULT_MULTIPLIER,
};

mod backoff;
mod config;

/// Decides whether and when to make another attempt.
#[derive(Clone)]
pub struct RetryScheduler {
    pub(crate) max_attempts: usize,
    // Ceiling of a single delay; `None` once a custom backoff replaces the
    // built-in shape, which `max_wait` no longer bounds.
    pub(crate) delay_ceiling: Option<Duration>,
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
}

impl RetryScheduler {
    /// Creates a new builder with the default policy.
    pub fn builder() -> RetrySchedulerConfigBuilder {
        RetrySchedulerConfigBuilder::new()
    }

    /// Total attempts allowed per call, the first one included.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// True if attempt `attempt` (1-indexed) ended in a retryable failure and
    /// the attempt budget is not spent.
    pub fn should_retry(&self, attempt: usize, classification: &Classification) -> bool {
        classification.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before the attempt following `attempt`.
    pub fn next_delay(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }

    /// Upper bound on the total time one call can spend backing off.
    ///
    /// Only known for the built-in backoff shape. Returns `None` when a custom
    /// [`IntervalFunction`] was installed with
    /// [`backoff`](RetrySchedulerConfigBuilder::backoff).
    pub fn max_total_backoff(&self) -> Option<Duration> {
        let retries = u32::try_from(self.max_attempts.saturating_sub(1)).unwrap_or(u32::MAX);
        self.delay_ceiling.map(|ceiling| ceiling.saturating_mul(retries))
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ceiling: Some(DEFAULT_MAX_WAIT),
            interval_fn: Arc::new(
                ExponentialBackoff::new(DEFAULT_MIN_WAIT, DEFAULT_MAX_WAIT)
                    .multiplier(DEFAULT_MULTIPLIER),
            ),
        }
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("max_attempts", &self.max_attempts)
            .field("delay_ceiling", &self.delay_ceiling)
            .finish_non_exhaustive()
    }
}
