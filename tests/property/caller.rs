//! Property tests for the resilient caller.
//!
//! Invariants tested:
//! - Attempts never exceed max_attempts
//! - The call stops at the first success or terminal failure
//! - The reported attempt count matches what reached the transport
//! - The result's classification is the last attempt's

use callguard::transport::transport_fn;
use callguard::{
    CallDescriptor, CallResult, CircuitBreakerConfig, Classification, DefaultClassifier,
    ErrorClassifier, RawOutcome, ResilientCaller, RetryScheduler, Url,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;

fn outcome() -> impl Strategy<Value = RawOutcome> {
    prop_oneof![
        Just(RawOutcome::from_status(200, Vec::new())),
        Just(RawOutcome::from_status(404, Vec::new())),
        Just(RawOutcome::from_status(429, Vec::new())),
        Just(RawOutcome::from_status(503, Vec::new())),
        Just(RawOutcome::timeout()),
        Just(RawOutcome::connection_error()),
        Just(RawOutcome::protocol_error()),
    ]
}

/// What the caller should return for a script, computed without the caller.
fn expected(script: &[RawOutcome], max_attempts: usize) -> CallResult {
    for (index, outcome) in script.iter().enumerate() {
        let attempt = index + 1;
        let classification = DefaultClassifier.classify(outcome);
        if classification.is_success() {
            return CallResult::Success {
                body: Vec::new(),
                status_code: outcome.status_code(),
                attempts: attempt,
            };
        }
        if !classification.is_retryable() || attempt == max_attempts {
            return CallResult::Failed {
                classification,
                attempts_made: attempt,
            };
        }
    }
    unreachable!("script is at least max_attempts long")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(60))]

    /// Property: the caller follows the classify-then-retry model exactly
    #[test]
    fn matches_the_retry_model(
        max_attempts in 1usize..=6,
        script in prop::collection::vec(outcome(), 6),
    ) {
        let rt = Builder::new_current_thread().enable_time().start_paused(true).build().unwrap();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let c = Arc::clone(&calls);
            let replay = Arc::new(script.clone());

            let caller = ResilientCaller::builder()
                .circuit_breaker(
                    CircuitBreakerConfig::builder()
                        .failure_threshold(100)
                        .build()
                        .unwrap(),
                )
                .retry(
                    RetryScheduler::builder()
                        .max_attempts(max_attempts)
                        .min_wait(Duration::from_millis(10))
                        .build()
                        .unwrap(),
                )
                .build(transport_fn(move |_call, _timeout, _cancel| {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    let outcome = replay[n].clone();
                    async move { outcome }
                }))
                .unwrap();

            let call = CallDescriptor::get(Url::parse("https://model.example.com/").unwrap());
            let result = caller.call(call).await;

            prop_assert!(result.attempts_made() <= max_attempts);
            prop_assert_eq!(result.attempts_made(), calls.load(Ordering::SeqCst));
            prop_assert_eq!(&result, &expected(&script, max_attempts));
            if let Some(classification) = result.classification() {
                prop_assert_ne!(classification, Classification::Success);
            }
            Ok(())
        })?;
    }
}
