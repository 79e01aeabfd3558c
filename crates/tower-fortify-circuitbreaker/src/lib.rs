//! Circuit breaker policy for Tower services.
//!
//! After a run of consecutive failures of the handled kinds the breaker stops
//! calling the operation for a cool-down period and fails fast instead.
//!
//! ## States
//! - **Closed**: calls pass through. A handled failure increments the
//!   consecutive-failure count; any success resets it. Reaching the threshold
//!   opens the circuit and fires `on_break`.
//! - **Open**: calls fail immediately with an
//!   [`ErrorKind::CircuitOpen`](tower_fortify_core::ErrorKind::CircuitOpen) error
//!   carrying the remaining break time. The operation is not invoked.
//! - **HalfOpen**: entered on the first call after the break elapses. Exactly
//!   one trial call is let through; concurrent callers are rejected. Trial
//!   success closes the circuit (`on_reset`), a handled trial failure opens it
//!   again for a full break.
//!
//! Failures of unhandled kinds pass through in every state and neither count
//! nor trigger transitions.
//!
//! ## Usage
//!
//! ```rust
//! use tower_fortify_circuitbreaker::CircuitBreakerLayer;
//! use tower_fortify_core::{ClassifiedError, ErrorKind};
//! use tower::{ServiceBuilder, service_fn};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreakerLayer::handle(ErrorKind::PermanentUnavailable)
//!     .failure_threshold(3)
//!     .break_duration(Duration::from_secs(30))
//!     .on_break(|err, duration| println!("breaking for {:?}: {}", duration, err))
//!     .on_reset(|| println!("circuit closed"))
//!     .build()
//!     .unwrap();
//!
//! let service = ServiceBuilder::new()
//!     .layer(breaker)
//!     .service(service_fn(|req: String| async move {
//!         Ok::<String, ClassifiedError>(req)
//!     }));
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging and tracing using the `tracing` crate
//! - `serde`: enables `Serialize`/`Deserialize` for [`CircuitState`]

use crate::circuit::Permit;
use crate::layer::Shared;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tower_fortify_core::ClassifiedError;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

mod circuit;
mod config;
mod events;
mod layer;

/// A Tower Service that applies circuit breaker logic to an inner service.
pub struct CircuitBreaker<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> CircuitBreaker<S> {
    pub(crate) fn new(inner: S, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    /// The state a call made now would observe.
    pub fn state(&self) -> CircuitState {
        self.shared.state()
    }

    /// Returns a snapshot of the circuit.
    pub fn metrics(&self) -> CircuitMetrics {
        self.shared.metrics()
    }

    /// Opens the circuit until [`reset`](Self::reset) is called.
    pub fn force_open(&self) {
        self.shared.force_open()
    }

    /// Closes the circuit and clears the failure count.
    pub fn reset(&self) {
        self.shared.reset()
    }
}

impl<S> Clone for CircuitBreaker<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Holds the half-open slot while a trial call runs. Dropping it before the
/// outcome is recorded frees the slot and leaves the circuit half-open.
struct TrialGuard {
    shared: Option<Arc<Shared>>,
}

impl TrialGuard {
    fn new(shared: &Arc<Shared>, trial: bool) -> Self {
        Self {
            shared: trial.then(|| Arc::clone(shared)),
        }
    }

    fn disarm(&mut self) {
        self.shared = None;
    }
}

impl Drop for TrialGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.lock().release_trial();
        }
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S>
where
    S: Service<Req, Error = ClassifiedError> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = ClassifiedError;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let shared = Arc::clone(&self.shared);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                breaker = %shared.config.name,
                "checking if call is permitted by circuit breaker"
            );

            let permit = shared.with_circuit(|circuit, config, now, pending| {
                circuit.try_acquire(config, now, pending)
            });

            let trial = match permit {
                Permit::Granted { trial } => trial,
                Permit::Rejected { remaining } => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        breaker = %shared.config.name,
                        remaining_ms = remaining.as_millis() as u64,
                        "circuit breaker rejected call"
                    );
                    return Err(ClassifiedError::circuit_open(
                        &shared.config.name,
                        remaining,
                    ));
                }
            };

            let mut guard = TrialGuard::new(&shared, trial);
            let result = inner.call(req).await;
            guard.disarm();

            shared.with_circuit(|circuit, config, now, pending| match &result {
                Ok(_) => circuit.record_success(config, now, trial, pending),
                Err(error) if config.handled.matches(error) => {
                    circuit.record_failure(config, error, now, trial, pending)
                }
                Err(_) => circuit.record_ignored(config, trial),
            });

            result
        })
    }
}
