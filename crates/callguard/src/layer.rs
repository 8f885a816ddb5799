//! Tower layer for the resilient caller.

use crate::config::{ResilientCallConfig, ResilientCallConfigBuilder};
use crate::transport::{AttemptRequest, ServiceTransport};
use crate::ResilientCaller;
use callguard_core::RawOutcome;
use std::convert::Infallible;
use std::sync::Arc;
use tower::layer::Layer;
use tower::Service;

/// A Tower layer that turns a transport service into a [`ResilientCaller`].
///
/// The wrapped service receives one [`AttemptRequest`] per attempt. Every
/// service produced by the same layer shares one circuit breaker, so failure
/// history is kept per destination across them.
///
/// # Examples
///
/// ```
/// use callguard::{AttemptRequest, RawOutcome, ResilientCallLayer};
/// use std::convert::Infallible;
/// use tower::{service_fn, Layer};
///
/// let layer = ResilientCallLayer::builder().name("billing").layer().unwrap();
/// let caller = layer.layer(service_fn(|_req: AttemptRequest| async {
///     Ok::<_, Infallible>(RawOutcome::from_status(200, Vec::new()))
/// }));
/// # let _ = caller;
/// ```
#[derive(Clone)]
pub struct ResilientCallLayer {
    config: Arc<ResilientCallConfig>,
}

impl ResilientCallLayer {
    pub(crate) fn new(config: impl Into<Arc<ResilientCallConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }

    /// Creates a new builder for configuring the layer.
    pub fn builder() -> ResilientCallConfigBuilder {
        ResilientCallConfigBuilder::new()
    }
}

impl<S> Layer<S> for ResilientCallLayer
where
    S: Service<AttemptRequest, Response = RawOutcome, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    type Service = ResilientCaller;

    fn layer(&self, service: S) -> Self::Service {
        ResilientCaller::new(
            Arc::new(ServiceTransport::new(service)),
            Arc::clone(&self.config),
        )
    }
}
