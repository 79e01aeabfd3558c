use crate::circuit::{Circuit, CircuitMetrics, CircuitState, Pending};
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::CircuitBreaker;
use std::sync::{Arc, Mutex, PoisonError};
use tower::Layer;
use tower_fortify_core::{ErrorKind, Instant, PolicyExt};

/// State shared by a layer and every service it produced.
pub(crate) struct Shared {
    pub(crate) config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
}

impl Shared {
    fn new(config: CircuitBreakerConfig) -> Self {
        let now = config.clock.now();
        Self {
            config,
            circuit: Mutex::new(Circuit::new(now)),
        }
    }

    /// Runs `f` under the circuit lock, then emits the events it produced.
    pub(crate) fn with_circuit<R>(
        &self,
        f: impl FnOnce(&mut Circuit, &CircuitBreakerConfig, Instant, &mut Pending) -> R,
    ) -> R {
        let now = self.config.clock.now();
        let mut pending = Vec::new();
        let result = {
            let mut circuit = self.lock();
            f(&mut circuit, &self.config, now, &mut pending)
        };
        for event in &pending {
            self.config.event_listeners.emit(event);
        }
        result
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> CircuitState {
        let now = self.config.clock.now();
        self.lock().observed_state(&self.config, now)
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        let now = self.config.clock.now();
        self.lock().metrics(now)
    }

    pub(crate) fn force_open(&self) {
        self.with_circuit(|circuit, config, now, pending| circuit.force_open(config, now, pending));
    }

    pub(crate) fn reset(&self) {
        self.with_circuit(|circuit, config, now, pending| circuit.reset(config, now, pending));
    }
}

/// A Tower [`Layer`] that applies a consecutive-failure circuit breaker.
///
/// The circuit lives in the layer: every service produced by one layer (and
/// every clone of those services) shares the same state. Build a separate
/// layer for each dependency that should be broken independently.
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use tower_fortify_circuitbreaker::{CircuitBreakerLayer, CircuitState};
/// use tower_fortify_core::{ClassifiedError, ErrorKind};
/// use std::time::Duration;
///
/// let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
///     .failure_threshold(2)
///     .break_duration(Duration::from_secs(10))
///     .build()
///     .unwrap();
///
/// let service = ServiceBuilder::new()
///     .layer(breaker.clone())
///     .service(service_fn(|req: String| async move { Ok::<_, ClassifiedError>(req) }));
///
/// assert_eq!(breaker.state(), CircuitState::Closed);
/// ```
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    shared: Arc<Shared>,
}

impl CircuitBreakerLayer {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
        }
    }

    /// Starts a builder counting failures of `kind`.
    pub fn handle(kind: ErrorKind) -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new(kind)
    }

    /// The validated configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// The state a call made now would observe.
    ///
    /// Reports `HalfOpen` once the break has elapsed, even before the next
    /// call performs the transition.
    pub fn state(&self) -> CircuitState {
        self.shared.state()
    }

    /// Returns a snapshot of the circuit.
    pub fn metrics(&self) -> CircuitMetrics {
        self.shared.metrics()
    }

    /// Opens the circuit and keeps it open until [`reset`](Self::reset).
    pub fn force_open(&self) {
        self.shared.force_open()
    }

    /// Closes the circuit and clears the failure count.
    pub fn reset(&self) {
        self.shared.reset()
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreaker<S>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(service, Arc::clone(&self.shared))
    }
}

impl PolicyExt for CircuitBreakerLayer {}

impl std::fmt::Debug for CircuitBreakerLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerLayer")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .finish()
    }
}
