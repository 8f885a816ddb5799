use std::time::Duration;

/// Computes the wait between attempts.
///
/// Implementations must be pure: the same attempt number always yields the
/// same delay.
pub trait IntervalFunction: Send + Sync {
    /// Delay to wait after attempt `attempt` failed, before attempt `attempt + 1`.
    ///
    /// # Arguments
    /// * `attempt` - The attempt that just failed (1-indexed, so the delay after
    ///   the first attempt is `next_interval(1)`)
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Fixed interval backoff - returns the same duration for every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a new fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Capped exponential backoff: `min(max_wait, min_wait * multiplier^(n-1))`.
///
/// A multiplier of `1.0` gives a constant `min_wait`; growth needs a
/// multiplier above one.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_wait: Duration,
    multiplier: f64,
    max_wait: Duration,
}

impl ExponentialBackoff {
    /// Creates a backoff starting at `min_wait` and never exceeding `max_wait`,
    /// with a multiplier of 1.
    pub fn new(min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            min_wait,
            multiplier: 1.0,
            max_wait,
        }
    }

    /// Sets the growth factor between consecutive delays.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1);
        if exponent == 0 || self.multiplier == 1.0 {
            return self.min_wait.min(self.max_wait);
        }

        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let secs = self.min_wait.as_secs_f64() * self.multiplier.powi(exponent);

        // Overflowed or past the cap: stay at the cap without building a
        // Duration from an unrepresentable value.
        if !secs.is_finite() || secs >= self.max_wait.as_secs_f64() {
            return self.max_wait;
        }

        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_wait)
            .min(self.max_wait)
    }
}

/// Function-based interval implementation.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a new function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
