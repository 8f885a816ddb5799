use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use callguard_core::{ConfigError, EventListener, EventListeners, FnListener};
use std::time::Duration;

/// Configuration shared by every destination of one [`CircuitBreaker`].
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: usize,
    pub(crate) recovery_timeout: Duration,
    pub(crate) half_open_trial_budget: usize,
    pub(crate) successes_to_close: usize,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Consecutive failures that open a closed circuit.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Time an open circuit waits before admitting a trial.
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Maximum concurrent trials while half-open.
    pub fn half_open_trial_budget(&self) -> usize {
        self.half_open_trial_budget
    }

    /// Instance name used in events and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for a [`CircuitBreaker`].
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: usize,
    recovery_timeout: Duration,
    half_open_trial_budget: usize,
    successes_to_close: usize,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_trial_budget: 1,
            successes_to_close: 1,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets how many consecutive failures open a closed circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets how long an open circuit rejects calls before admitting a trial.
    ///
    /// Default: 30 seconds
    pub fn recovery_timeout(mut self, duration: Duration) -> Self {
        self.recovery_timeout = duration;
        self
    }

    /// Sets how many trials may be in flight at once while half-open.
    ///
    /// Default: 1
    pub fn half_open_trial_budget(mut self, n: usize) -> Self {
        self.half_open_trial_budget = n;
        self
    }

    /// Sets how many successful trials close a half-open circuit.
    ///
    /// A single failed trial always reopens it.
    ///
    /// Default: 1
    pub fn successes_to_close(mut self, n: usize) -> Self {
        self.successes_to_close = n;
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a listener for every breaker event.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback for state transitions of any destination.
    ///
    /// # Callback Signature
    /// `Fn(&str, CircuitState, CircuitState)`: destination, from, to.
    ///
    /// # Example
    /// ```rust
    /// use callguard_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|destination, from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("{destination} degraded ({from:?} -> {to:?})");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # let _ = breaker;
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    destination,
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(destination, *from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback for admissions refused by the breaker.
    ///
    /// # Callback Signature
    /// `Fn(&str, CircuitState)`: destination and the state that refused it
    /// (`Open`, or `HalfOpen` with its trial budget in use).
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallRejected {
                    destination, state, ..
                } = event
                {
                    f(destination, *state);
                }
            }));
        self
    }

    /// Registers a callback for admitted attempts.
    ///
    /// # Callback Signature
    /// `Fn(&str, bool)`: destination and whether the admission is a half-open trial.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted {
                    destination, trial, ..
                } = event
                {
                    f(destination, *trial);
                }
            }));
        self
    }

    /// Builds the breaker, validating every setting.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a count is zero or the recovery timeout is zero.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        let config = CircuitBreakerConfig {
            failure_threshold: ConfigError::require_count(
                "failure_threshold",
                self.failure_threshold,
            )?,
            recovery_timeout: ConfigError::require_duration(
                "recovery_timeout",
                self.recovery_timeout,
            )?,
            half_open_trial_budget: ConfigError::require_count(
                "half_open_trial_budget",
                self.half_open_trial_budget,
            )?,
            successes_to_close: ConfigError::require_count(
                "successes_to_close",
                self.successes_to_close,
            )?,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(CircuitBreaker::new(config))
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
