//! Property tests for the retry scheduler.
//!
//! Invariants tested:
//! - Delays never exceed max_wait
//! - The first delay is min_wait
//! - Delays never shrink when the multiplier is at least one
//! - should_retry never allows an attempt past max_attempts
//! - Only retryable failures are retried

use callguard_core::{Classification, FailureReason, TransportErrorKind};
use callguard_retry::RetryScheduler;
use proptest::prelude::*;
use std::time::Duration;

fn scheduler(max_attempts: usize, min_ms: u64, max_ms: u64, multiplier: f64) -> RetryScheduler {
    RetryScheduler::builder()
        .max_attempts(max_attempts)
        .min_wait(Duration::from_millis(min_ms))
        .max_wait(Duration::from_millis(max_ms))
        .multiplier(multiplier)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: delays are bounded by max_wait and start at min_wait
    #[test]
    fn delays_are_bounded(
        min_ms in 0u64..=2_000,
        extra_ms in 0u64..=20_000,
        multiplier in 0.1f64..=8.0,
        attempt in 1usize..=64,
    ) {
        let max_ms = min_ms + extra_ms;
        let scheduler = scheduler(3, min_ms, max_ms, multiplier);

        prop_assert_eq!(scheduler.next_delay(1), Duration::from_millis(min_ms));
        prop_assert!(scheduler.next_delay(attempt) <= Duration::from_millis(max_ms));
    }

    /// Property: with multiplier >= 1 each delay is at least the previous one
    #[test]
    fn delays_are_monotonic(
        min_ms in 1u64..=1_000,
        extra_ms in 0u64..=60_000,
        multiplier in 1.0f64..=5.0,
    ) {
        let scheduler = scheduler(3, min_ms, min_ms + extra_ms, multiplier);

        let mut previous = Duration::ZERO;
        for attempt in 1..=40 {
            let delay = scheduler.next_delay(attempt);
            prop_assert!(delay >= previous, "attempt {}: {:?} < {:?}", attempt, delay, previous);
            previous = delay;
        }
    }

    /// Property: the number of permitted retries is max_attempts - 1
    #[test]
    fn retries_stop_at_max_attempts(max_attempts in 1usize..=20) {
        let scheduler = scheduler(max_attempts, 10, 100, 2.0);
        let timeout = Classification::RetryableFailure {
            reason: FailureReason::Transport(TransportErrorKind::Timeout),
        };

        let retries = (1..=max_attempts + 5)
            .take_while(|&attempt| scheduler.should_retry(attempt, &timeout))
            .count();
        prop_assert_eq!(retries, max_attempts - 1);
    }

    /// Property: terminal failures are never retried regardless of attempt
    #[test]
    fn terminal_never_retried(status in 400u16..500, attempt in 1usize..=10) {
        let scheduler = scheduler(20, 10, 100, 1.0);
        let terminal = Classification::TerminalFailure { reason: FailureReason::Status(status) };
        prop_assert!(!scheduler.should_retry(attempt, &terminal));
        prop_assert!(!scheduler.should_retry(attempt, &Classification::Cancelled));
    }

    /// Property: total backoff for a call stays under the documented bound
    #[test]
    fn total_backoff_is_bounded(
        max_attempts in 1usize..=12,
        multiplier in 1.0f64..=4.0,
    ) {
        let scheduler = scheduler(max_attempts, 100, 1_000, multiplier);
        let total: Duration = (1..max_attempts).map(|n| scheduler.next_delay(n)).sum();
        let bound = scheduler.max_total_backoff();
        prop_assert!(bound.is_some());
        prop_assert!(Some(total) <= bound);
    }
}

#[test]
fn documented_doubling_sequence() {
    let scheduler = scheduler(6, 1_000, 10_000, 2.0);
    let delays: Vec<_> = (1..=5).map(|n| scheduler.next_delay(n)).collect();
    assert_eq!(
        delays,
        [1, 2, 4, 8, 10].map(Duration::from_secs).to_vec()
    );
}
