use super::{get, ok, unavailable, Scripted};
use callguard::transport::transport_fn;
use callguard::{
    CallResult, CircuitBreakerConfig, CircuitState, RawOutcome, ResilientCaller, RetryScheduler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "https://search.example.com/query";
const ORIGIN: &str = "https://search.example.com";

/// Transport that tracks the highest number of attempts in flight at once.
fn gauged(latency: Duration) -> (impl callguard::Transport, Arc<AtomicUsize>) {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let p = Arc::clone(&peak);

    let transport = transport_fn(move |_call, _timeout, _cancel| {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&p);
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            RawOutcome::from_status(200, Vec::new())
        }
    });
    (transport, peak)
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_at_most_the_trial_budget() {
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(30))
        .half_open_trial_budget(2)
        .build()
        .unwrap();
    let single = || RetryScheduler::builder().max_attempts(1).build().unwrap();

    let tripper = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .retry(single())
        .build(Scripted::always(unavailable()))
        .unwrap();
    tripper.call(get(URL)).await;
    tokio::time::advance(Duration::from_secs(30)).await;

    let (transport, peak) = gauged(Duration::from_secs(1));
    let caller = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .retry(single())
        .build(transport)
        .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let caller = caller.clone();
            tokio::spawn(async move { caller.call(get(URL)).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CallResult::Success { .. } => succeeded += 1,
            CallResult::RejectedByBreaker { .. } => rejected += 1,
            other => panic!("unexpected result {other:?}"),
        }
    }

    assert_eq!(succeeded, 2);
    assert_eq!(rejected, 8);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Closed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_respect_budget_across_threads() {
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_millis(20))
        .half_open_trial_budget(3)
        .build()
        .unwrap();

    if let callguard_circuitbreaker::Admission::Allowed(ticket) = breaker.admit(ORIGIN) {
        breaker.record(
            ORIGIN,
            ticket,
            &callguard::Classification::TerminalFailure {
                reason: callguard::FailureReason::Status(500),
            },
        );
    }
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Open));
    tokio::time::sleep(Duration::from_millis(40)).await;

    let allowed = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(tokio::sync::Barrier::new(32));
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let breaker = breaker.clone();
            let allowed = Arc::clone(&allowed);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                if breaker.admit(ORIGIN).is_allowed() {
                    allowed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(allowed.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.snapshot(ORIGIN).unwrap().trials_in_flight, 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failures_open_the_circuit_exactly_once() {
    let transitions = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&transitions);
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(5)
        .on_state_transition(move |_, _, to| {
            if to == CircuitState::Open {
                t.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();

    let transport = Scripted::slow(Vec::new(), unavailable(), Duration::from_millis(100));
    let caller = ResilientCaller::builder()
        .circuit_breaker(breaker.clone())
        .retry(RetryScheduler::builder().max_attempts(1).build().unwrap())
        .build(Arc::clone(&transport))
        .unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let caller = caller.clone();
            tokio::spawn(async move { caller.call(get(URL)).await })
        })
        .collect();
    for handle in handles {
        assert!(!handle.await.unwrap().is_success());
    }

    // All 20 were admitted while closed; records after the trip are stale.
    assert_eq!(transport.calls(), 20);
    assert_eq!(transitions.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(ORIGIN), Some(CircuitState::Open));
}

#[tokio::test(start_paused = true)]
async fn unrelated_destinations_proceed_in_parallel() {
    let transport = Scripted::slow(Vec::new(), ok(), Duration::from_secs(1));
    let caller = ResilientCaller::builder()
        .build(Arc::clone(&transport))
        .unwrap();

    let started = tokio::time::Instant::now();
    let calls = (0..8).map(|i| {
        let caller = caller.clone();
        async move {
            caller
                .call(get(&format!("https://shard-{i}.example.com/")))
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(CallResult::is_success));
    assert_eq!(caller.circuit_breaker().len(), 8);
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}
