//! One timed attempt.

use crate::transport::Transport;
use callguard_core::{CallDescriptor, RawOutcome};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs exactly one call through a [`Transport`], bounded by a timeout.
///
/// The transport is trusted to honour the timeout, but an attempt never
/// outlives it: an overrun is reported as [`RawOutcome::TransportError`] with
/// kind `Timeout` and the transport future is dropped. An `Attempt` keeps no
/// state between calls.
#[derive(Clone)]
pub struct Attempt {
    transport: Arc<dyn Transport>,
}

impl Attempt {
    /// Creates an attempt runner over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Performs the attempt.
    pub fn run(
        &self,
        call: Arc<CallDescriptor>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, RawOutcome> {
        let execution = self.transport.execute(call, timeout, cancel);

        Box::pin(async move {
            match tokio::time::timeout(timeout, execution).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => RawOutcome::timeout(),
            }
        })
    }
}

impl std::fmt::Debug for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attempt").finish_non_exhaustive()
    }
}
