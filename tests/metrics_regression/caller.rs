//! Resilient caller metrics regression tests

use super::helpers::*;
use callguard::transport::transport_fn;
use callguard::{
    CallDescriptor, CircuitBreakerConfig, RawOutcome, ResilientCaller, RetryScheduler, Url,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn call(url: &str) -> CallDescriptor {
    CallDescriptor::get(Url::parse(url).unwrap())
}

#[tokio::test(start_paused = true)]
#[serial]
async fn caller_metrics_exist() {
    init_recorder();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let caller = ResilientCaller::builder()
        .name("test_caller")
        .retry(
            RetryScheduler::builder()
                .max_attempts(3)
                .min_wait(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .build(transport_fn(move |_call, _timeout, _cancel| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    RawOutcome::from_status(503, Vec::new())
                } else {
                    RawOutcome::from_status(200, Vec::new())
                }
            }
        }))
        .unwrap();

    assert!(caller.call(call("https://api.example.com/v1")).await.is_success());

    assert_counter_exists("callguard_attempts_total");
    assert_metric_has_label("callguard_attempts_total", "caller", "test_caller");
    assert_metric_has_label("callguard_attempts_total", "classification", "retryable");
    assert_metric_has_label("callguard_attempts_total", "classification", "success");

    assert_histogram_exists("callguard_attempt_duration_seconds");
    assert_metric_has_label(
        "callguard_attempt_duration_seconds",
        "caller",
        "test_caller",
    );

    assert_counter_exists("callguard_calls_total");
    assert_metric_has_label("callguard_calls_total", "caller", "test_caller");
    assert_metric_has_label("callguard_calls_total", "result", "success");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn caller_metrics_described_once_for_many_callers() {
    init_recorder();

    let callers: Vec<_> = (0..3)
        .map(|i| {
            ResilientCaller::builder()
                .name(format!("described_{i}"))
                .build(transport_fn(|_call, _timeout, _cancel| async {
                    RawOutcome::from_status(200, Vec::new())
                }))
                .unwrap()
        })
        .collect();

    for caller in &callers {
        assert!(caller.call(call("https://described.example.com/")).await.is_success());
    }

    assert_metric_described("callguard_attempts_total");
    assert_metric_described("callguard_calls_total");
    assert_metric_described("callguard_attempt_duration_seconds");
    assert_metric_has_label("callguard_calls_total", "caller", "described_2");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn caller_rejection_metrics() {
    init_recorder();

    let caller = ResilientCaller::builder()
        .name("rejecting_caller")
        .circuit_breaker(
            CircuitBreakerConfig::builder()
                .name("rejecting_cb")
                .failure_threshold(1)
                .build()
                .unwrap(),
        )
        .retry(RetryScheduler::builder().max_attempts(1).build().unwrap())
        .build(transport_fn(|_call, _timeout, _cancel| async {
            RawOutcome::connection_error()
        }))
        .unwrap();

    assert!(!caller.call(call("https://down.example.com/")).await.is_success());
    assert!(caller.call(call("https://down.example.com/")).await.is_rejected());

    assert_metric_has_label("callguard_calls_total", "caller", "rejecting_caller");
    assert_metric_has_label("callguard_calls_total", "result", "failed");
    assert_metric_has_label("callguard_calls_total", "result", "rejected");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "rejecting_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");
}
