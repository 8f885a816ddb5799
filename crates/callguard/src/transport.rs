//! The seam to whatever performs a single network attempt.
//!
//! A [`Transport`] receives the call, the time budget for this attempt and a
//! cancellation token, and always answers with a [`RawOutcome`]. Native faults
//! (DNS failures, resets, malformed frames) must be mapped to
//! [`RawOutcome::TransportError`] by the transport itself.

use callguard_core::{CallDescriptor, RawOutcome};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};

/// Performs exactly one attempt of a call.
pub trait Transport: Send + Sync + 'static {
    /// Executes `call` once.
    ///
    /// Implementations should give up after `timeout` and should stop work when
    /// `cancel` fires. The returned future may also be dropped at any point.
    fn execute(
        &self,
        call: Arc<CallDescriptor>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(
        &self,
        call: Arc<CallDescriptor>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome> {
        (**self).execute(call, timeout, cancel)
    }
}

/// A [`Transport`] backed by a closure.
///
/// Created with [`transport_fn`].
#[derive(Clone)]
pub struct TransportFn<F> {
    f: F,
}

/// Builds a [`Transport`] from an async closure.
///
/// ```rust
/// use callguard::transport::transport_fn;
/// use callguard::RawOutcome;
///
/// let transport = transport_fn(|_call, _timeout, _cancel| async {
///     RawOutcome::from_status(200, b"{}".to_vec())
/// });
/// # let _ = transport;
/// ```
pub fn transport_fn<F, Fut>(f: F) -> TransportFn<F>
where
    F: Fn(Arc<CallDescriptor>, Duration, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RawOutcome> + Send + 'static,
{
    TransportFn { f }
}

impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Arc<CallDescriptor>, Duration, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RawOutcome> + Send + 'static,
{
    fn execute(
        &self,
        call: Arc<CallDescriptor>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome> {
        Box::pin((self.f)(call, timeout, cancel))
    }
}

/// The request handed to a tower service acting as a transport.
#[derive(Debug, Clone)]
pub struct AttemptRequest {
    /// The call being attempted.
    pub call: Arc<CallDescriptor>,
    /// Time budget for this attempt.
    pub timeout: Duration,
    /// Fires when the attempt is abandoned.
    pub cancel: CancellationToken,
}

/// Adapts a `tower::Service<AttemptRequest>` into a [`Transport`].
///
/// The service is cloned for every attempt, so it must be cheap to clone. It
/// cannot fail: errors belong in the returned [`RawOutcome`].
#[derive(Clone)]
pub struct ServiceTransport<S> {
    inner: S,
}

impl<S> ServiceTransport<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Transport for ServiceTransport<S>
where
    S: Service<AttemptRequest, Response = RawOutcome, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    fn execute(
        &self,
        call: Arc<CallDescriptor>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome> {
        let inner = self.inner.clone();
        let request = AttemptRequest {
            call,
            timeout,
            cancel,
        };

        Box::pin(async move {
            match inner.oneshot(request).await {
                Ok(outcome) => outcome,
                Err(never) => match never {},
            }
        })
    }
}
