//! End-to-end tests for `ResilientCaller`.
//!
//! Test organization:
//! - retry_flow.rs: attempt counting, backoff timing, classification policy
//! - breaker_interaction.rs: admission, fast-fail, recovery, destinations
//! - cancellation.rs: tokens, deadlines, dropped futures
//! - concurrency.rs: half-open trial budget under concurrent calls

mod cancellation;
mod concurrency;

use callguard::{CallDescriptor, RawOutcome, Transport, Url};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Transport that replays a script of outcomes, then repeats a fallback.
pub(crate) struct Scripted {
    script: Mutex<VecDeque<RawOutcome>>,
    fallback: RawOutcome,
    latency: Duration,
    calls: AtomicUsize,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl Scripted {
    pub(crate) fn always(outcome: RawOutcome) -> Arc<Self> {
        Self::script(Vec::new(), outcome)
    }

    pub(crate) fn script(script: Vec<RawOutcome>, fallback: RawOutcome) -> Arc<Self> {
        Self::slow(script, fallback, Duration::ZERO)
    }

    pub(crate) fn slow(script: Vec<RawOutcome>, fallback: RawOutcome, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            latency,
            calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cancellation tokens handed to each attempt, in order.
    pub(crate) fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn execute(
        &self,
        _call: Arc<CallDescriptor>,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().push(cancel);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let latency = self.latency;

        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        })
    }
}

pub(crate) fn get(url: &str) -> CallDescriptor {
    CallDescriptor::get(Url::parse(url).unwrap())
}

pub(crate) fn ok() -> RawOutcome {
    RawOutcome::from_status(200, br#"{"ok": true}"#.to_vec())
}

pub(crate) fn unavailable() -> RawOutcome {
    RawOutcome::from_status(503, Vec::new())
}
