use super::{get, ok, unavailable, Scripted};
use callguard::{
    CallResult, CircuitBreakerConfig, CircuitState, Classification, ResilientCaller,
    RetryScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const URL: &str = "https://reports.example.com/daily";
const ORIGIN: &str = "https://reports.example.com";

fn cancel_after(token: &CancellationToken, after: Duration) {
    let token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        token.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn cancelling_during_backoff_stops_promptly() {
    let transport = Scripted::always(unavailable());
    let caller = ResilientCaller::builder()
        .retry(
            RetryScheduler::builder()
                .min_wait(Duration::from_secs(10))
                .max_wait(Duration::from_secs(10))
                .build()
                .unwrap(),
        )
        .build(Arc::clone(&transport))
        .unwrap();

    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_millis(500));

    let started = Instant::now();
    let result = caller.call_with_cancel(get(URL), token).await;

    assert_eq!(
        result,
        CallResult::Failed {
            classification: Classification::Cancelled,
            attempts_made: 1
        }
    );
    assert_eq!(started.elapsed(), Duration::from_millis(500));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelling_an_attempt_in_flight_aborts_it() {
    let transport = Scripted::slow(Vec::new(), ok(), Duration::from_secs(20));
    let caller = ResilientCaller::builder()
        .build(Arc::clone(&transport))
        .unwrap();

    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(2));

    let result = caller.call_with_cancel(get(URL), token).await;

    assert!(result.is_cancelled());
    assert_eq!(result.attempts_made(), 1);
    assert_eq!(result.summary().error.as_deref(), Some("CANCELLED"));

    let tokens = transport.tokens();
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_cancelled());

    // Cancellation does not count as a failure.
    let snapshot = caller.circuit_breaker().snapshot(ORIGIN).unwrap();
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_token_never_reaches_the_breaker() {
    let transport = Scripted::always(ok());
    let caller = ResilientCaller::builder()
        .build(Arc::clone(&transport))
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let result = caller.call_with_cancel(get(URL), token).await;

    assert_eq!(
        result,
        CallResult::Failed {
            classification: Classification::Cancelled,
            attempts_made: 0
        }
    );
    assert_eq!(transport.calls(), 0);
    assert!(caller.circuit_breaker().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_ends_the_call_as_cancelled() {
    let transport = Scripted::always(unavailable());
    let caller = ResilientCaller::builder()
        .build(Arc::clone(&transport))
        .unwrap();

    let deadline = Instant::now() + Duration::from_millis(1500);
    let result = caller.call_with_deadline(get(URL), deadline).await;

    // Attempts at 0s and 1s, then the deadline lands inside the second backoff.
    assert!(result.is_cancelled());
    assert_eq!(result.attempts_made(), 2);
    assert_eq!(Instant::now(), deadline);
}

#[tokio::test(start_paused = true)]
async fn cancelled_trial_frees_the_half_open_slot() {
    let transport = Scripted::slow(vec![], ok(), Duration::from_secs(60));
    let failing = Scripted::always(unavailable());

    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let single = || RetryScheduler::builder().max_attempts(1).build().unwrap();

    let tripper = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .retry(single())
        .build(Arc::clone(&failing))
        .unwrap();
    let caller = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .retry(single())
        .default_timeout(Duration::from_secs(120))
        .build(Arc::clone(&transport))
        .unwrap();

    tripper.call(get(URL)).await;
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Open));
    tokio::time::advance(Duration::from_secs(5)).await;

    let token = CancellationToken::new();
    cancel_after(&token, Duration::from_secs(1));
    let result = caller.call_with_cancel(get(URL), token).await;
    assert!(result.is_cancelled());

    let snapshot = breaker.snapshot(ORIGIN).unwrap();
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert_eq!(snapshot.trials_in_flight, 0);

    // The slot is available again for a real trial.
    let result = tripper.call(get(URL)).await;
    assert!(!result.is_rejected());
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Open));
}

#[tokio::test(start_paused = true)]
async fn dropped_call_future_releases_the_trial() {
    let transport = Scripted::script(vec![unavailable()], ok());
    let slow = Scripted::slow(vec![], ok(), Duration::from_secs(60));

    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let fast = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .build(Arc::clone(&transport))
        .unwrap();
    let hanging = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .default_timeout(Duration::from_secs(120))
        .build(Arc::clone(&slow))
        .unwrap();

    fast.call(get(URL)).await;
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Open));
    tokio::time::advance(Duration::from_secs(5)).await;

    let abandoned = tokio::time::timeout(Duration::from_secs(1), hanging.call(get(URL))).await;
    assert!(abandoned.is_err());
    assert_eq!(breaker.snapshot(ORIGIN).unwrap().trials_in_flight, 0);

    assert!(fast.call(get(URL)).await.is_success());
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Closed));
}
