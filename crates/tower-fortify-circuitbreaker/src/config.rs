use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use crate::CircuitBreakerLayer;
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::events::{EventListeners, FnListener};
use tower_fortify_core::{
    ClassifiedError, Clock, ConfigError, ErrorKind, HandledKinds, SharedClock, TokioClock,
};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Configuration for the circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) handled: HandledKinds,
    pub(crate) failure_threshold: usize,
    pub(crate) break_duration: Duration,
    pub(crate) clock: SharedClock,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Kinds that count as failures.
    pub fn handled(&self) -> HandledKinds {
        self.handled
    }

    /// Consecutive handled failures that open the circuit.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// How long the circuit stays open before a trial call.
    pub fn break_duration(&self) -> Duration {
        self.break_duration
    }

    /// Instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`CircuitBreakerLayer`].
pub struct CircuitBreakerConfigBuilder {
    handled: HandledKinds,
    failure_threshold: usize,
    break_duration: Duration,
    clock: Option<SharedClock>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a builder counting failures of `kind`.
    ///
    /// Defaults:
    /// - failure_threshold: 5
    /// - break_duration: 30 seconds
    /// - name: `"<unnamed>"`
    pub fn new(kind: ErrorKind) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "circuitbreaker_calls_total",
                "Total number of calls through the circuit breaker"
            );
            metrics::describe_counter!(
                "circuitbreaker_transitions_total",
                "Total number of circuit breaker state transitions"
            );
            metrics::describe_gauge!(
                "circuitbreaker_state",
                "Current state of the circuit breaker (0 closed, 1 open, 2 half-open)"
            );
        });

        Self {
            handled: HandledKinds::handle(kind),
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            clock: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Also counts failures of `kind`.
    pub fn or(mut self, kind: ErrorKind) -> Self {
        self.handled = self.handled.or(kind);
        self
    }

    /// Consecutive handled failures that open the circuit. Must be at least 1.
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// How long the circuit stays open before letting a trial call through.
    /// Must be greater than zero.
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// Replaces the clock used to time the break.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Sets the name for this circuit breaker (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a handled failure opens the circuit.
    ///
    /// Receives the failure and the break duration.
    pub fn on_break<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClassifiedError, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::Broken {
                error,
                break_duration,
                ..
            } = event
            {
                f(error, *break_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when the circuit closes again.
    pub fn on_reset<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                to_state: CircuitState::Closed,
                ..
            } = event
            {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked when the circuit becomes half-open.
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                to_state: CircuitState::HalfOpen,
                ..
            } = event
            {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked on every state transition.
    ///
    /// ```rust
    /// use tower_fortify_circuitbreaker::CircuitBreakerLayer;
    /// use tower_fortify_core::ErrorKind;
    ///
    /// let layer = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
    ///     .on_state_transition(|from, to| {
    ///         println!("circuit {:?} -> {:?}", from, to);
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call is refused. Receives the
    /// remaining break time.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { remaining, .. } = event {
                f(*remaining);
            }
        }));
        self
    }

    /// Validates the configuration and builds the layer.
    pub fn build(self) -> Result<CircuitBreakerLayer, ConfigError> {
        let failure_threshold =
            ConfigError::require_nonzero("failure_threshold", self.failure_threshold)?;
        let break_duration = ConfigError::require_positive("break_duration", self.break_duration)?;

        let config = CircuitBreakerConfig {
            handled: self.handled,
            failure_threshold,
            break_duration,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
            event_listeners: self.event_listeners,
            name: self.name,
        };

        Ok(CircuitBreakerLayer::new(config))
    }
}
