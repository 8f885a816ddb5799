use crate::events::{CallEvent, CallOutcome};
use crate::layer::ResilientCallLayer;
use crate::transport::Transport;
use crate::ResilientCaller;
use callguard_circuitbreaker::CircuitBreaker;
use callguard_core::{
    Classification, ConfigError, DefaultClassifier, ErrorClassifier, EventListener,
    EventListeners, FnClassifier, FnListener, RawOutcome,
};
use callguard_retry::RetryScheduler;
use std::sync::Arc;
use std::time::Duration;

/// Default time budget for one attempt when the call does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a [`ResilientCaller`].
pub struct ResilientCallConfig {
    pub(crate) breaker: CircuitBreaker,
    pub(crate) scheduler: RetryScheduler,
    pub(crate) classifier: Arc<dyn ErrorClassifier>,
    pub(crate) default_timeout: Duration,
    pub(crate) event_listeners: EventListeners<CallEvent>,
    pub(crate) name: String,
}

impl ResilientCallConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ResilientCallConfigBuilder {
        ResilientCallConfigBuilder::new()
    }
}

/// Builder for [`ResilientCaller`] and [`ResilientCallLayer`].
pub struct ResilientCallConfigBuilder {
    breaker: Option<CircuitBreaker>,
    scheduler: Option<RetryScheduler>,
    classifier: Arc<dyn ErrorClassifier>,
    default_timeout: Duration,
    event_listeners: EventListeners<CallEvent>,
    name: String,
}

impl Default for ResilientCallConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilientCallConfigBuilder {
    /// Creates a new builder.
    ///
    /// Defaults:
    /// - circuit breaker: 5 failures, 30s recovery, 1 trial, named after the caller
    /// - retry: 3 attempts, 1s to 10s, multiplier 1
    /// - classifier: [`DefaultClassifier`]
    /// - default timeout: 30s
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            breaker: None,
            scheduler: None,
            classifier: Arc::new(DefaultClassifier),
            default_timeout: DEFAULT_TIMEOUT,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Give this caller a human-readable name for observability.
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the attempt timeout used when a call carries no override.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Uses `breaker` for admission decisions.
    ///
    /// Callers that share a breaker share failure history per destination.
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Uses `scheduler` for retry decisions.
    pub fn retry(mut self, scheduler: RetryScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Replaces the default classification policy.
    pub fn classifier<C>(mut self, classifier: C) -> Self
    where
        C: ErrorClassifier + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Classifies outcomes with a closure.
    ///
    /// # Example
    /// ```rust
    /// use callguard::{Classification, DefaultClassifier, ErrorClassifier, RawOutcome, ResilientCaller};
    ///
    /// // Treat 404 as an empty success.
    /// let builder = ResilientCaller::builder().classify_with(|outcome: &RawOutcome| {
    ///     match outcome.status_code() {
    ///         Some(404) => Classification::Success,
    ///         _ => DefaultClassifier.classify(outcome),
    ///     }
    /// });
    /// # let _ = builder;
    /// ```
    pub fn classify_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&RawOutcome) -> Classification + Send + Sync + 'static,
    {
        self.classifier = Arc::new(FnClassifier::new(f));
        self
    }

    /// Registers a listener for every call event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<CallEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback for every classified attempt.
    ///
    /// # Callback Signature
    /// `Fn(&str, usize, Classification)`: destination, attempt index, classification.
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize, Classification) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CallEvent| {
                if let CallEvent::AttemptFinished {
                    destination,
                    attempt,
                    classification,
                    ..
                } = event
                {
                    f(destination, *attempt, *classification);
                }
            }));
        self
    }

    /// Registers a callback for scheduled retries.
    ///
    /// # Callback Signature
    /// `Fn(&str, usize, Duration)`: destination, the attempt that failed, backoff delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CallEvent| {
                if let CallEvent::RetryScheduled {
                    destination,
                    attempt,
                    delay,
                    ..
                } = event
                {
                    f(destination, *attempt, *delay);
                }
            }));
        self
    }

    /// Registers a callback for finished calls.
    ///
    /// # Callback Signature
    /// `Fn(&str, CallOutcome, usize)`: destination, how the call ended, attempts made.
    pub fn on_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CallOutcome, usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CallEvent| {
                if let CallEvent::CallFinished {
                    destination,
                    outcome,
                    attempts_made,
                    ..
                } = event
                {
                    f(destination, *outcome, *attempts_made);
                }
            }));
        self
    }

    fn build_config(self) -> Result<ResilientCallConfig, ConfigError> {
        let default_timeout = ConfigError::require_duration("default_timeout", self.default_timeout)?;

        let breaker = match self.breaker {
            Some(breaker) => breaker,
            None => CircuitBreaker::builder().name(self.name.clone()).build()?,
        };

        Ok(ResilientCallConfig {
            breaker,
            scheduler: self.scheduler.unwrap_or_default(),
            classifier: self.classifier,
            default_timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }

    /// Builds a caller over `transport`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the default timeout is zero.
    pub fn build<T>(self, transport: T) -> Result<ResilientCaller, ConfigError>
    where
        T: Transport,
    {
        self.build_shared(Arc::new(transport))
    }

    /// Builds a caller over an already shared transport.
    pub fn build_shared(self, transport: Arc<dyn Transport>) -> Result<ResilientCaller, ConfigError> {
        let config = self.build_config()?;
        Ok(ResilientCaller::new(transport, Arc::new(config)))
    }

    /// Builds a layer that turns a transport service into a [`ResilientCaller`].
    pub fn layer(self) -> Result<ResilientCallLayer, ConfigError> {
        Ok(ResilientCallLayer::new(self.build_config()?))
    }
}
