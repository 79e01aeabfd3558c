//! Fallback policy for Tower services.
//!
//! When the wrapped operation fails with one of the handled
//! [`ErrorKind`](tower_fortify_core::ErrorKind)s, the failure is absorbed and
//! a substitute value is returned as success. Failures of other kinds pass
//! through unchanged.
//!
//! Fallback is normally the outermost policy of a chain, so it sees the
//! outcome after retries and circuit breaking.
//!
//! # Strategies
//!
//! - [`value`](FallbackConfigBuilder::value): a static value, cloned per fallback
//! - [`supplier`](FallbackConfigBuilder::supplier): a closure producing a fresh value
//! - [`from_error`](FallbackConfigBuilder::from_error): a value computed from the failure
//!
//! # Example
//!
//! ```rust
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use tower_fortify_core::{ClassifiedError, ErrorKind};
//! use tower_fortify_fallback::FallbackLayer;
//!
//! # async fn example() -> Result<(), ClassifiedError> {
//! let fallback = FallbackLayer::handle(ErrorKind::PermanentUnavailable)
//!     .value("cached greeting".to_string())
//!     .on_fallback(|err| eprintln!("served fallback after: {}", err))
//!     .build()
//!     .unwrap();
//!
//! let mut service = ServiceBuilder::new()
//!     .layer(fallback)
//!     .service_fn(|_req: String| async {
//!         Err::<String, _>(ClassifiedError::permanent_unavailable("backend down"))
//!     });
//!
//! let response = service.ready().await?.call("hello".to_string()).await?;
//! assert_eq!(response, "cached greeting");
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `metrics`: `fallback_calls_total` counter labelled by result
//! - `tracing`: log applied and skipped fallbacks

mod config;
mod events;
mod layer;

pub use config::{FallbackConfig, FallbackConfigBuilder};
pub use events::FallbackEvent;
pub use layer::FallbackLayer;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tower_fortify_core::ClassifiedError;

/// A Tower [`Service`] that substitutes a fallback value for handled failures.
pub struct Fallback<S, T> {
    inner: S,
    config: Arc<FallbackConfig<T>>,
}

impl<S, T> Fallback<S, T> {
    /// Creates a new `Fallback` service wrapping the given service.
    pub fn new(inner: S, config: Arc<FallbackConfig<T>>) -> Self {
        Self { inner, config }
    }
}

impl<S, T> Clone for Fallback<S, T>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, T> Service<Req> for Fallback<S, T>
where
    S: Service<Req, Response = T, Error = ClassifiedError>,
    S::Future: Send + 'static,
    T: Send + 'static,
{
    type Response = T;
    type Error = ClassifiedError;
    type Future = BoxFuture<'static, Result<T, ClassifiedError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let fut = self.inner.call(req);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    #[cfg(feature = "metrics")]
                    counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "success")
                        .increment(1);

                    config.event_listeners.emit(&FallbackEvent::Success {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                    });
                    Ok(response)
                }
                Err(error) if !config.handled.matches(&error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        fallback = %config.name,
                        kind = %error.kind(),
                        "failure kind not handled, skipping fallback"
                    );
                    #[cfg(feature = "metrics")]
                    counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "skipped")
                        .increment(1);

                    config.event_listeners.emit(&FallbackEvent::Skipped {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        error: error.clone(),
                    });
                    Err(error)
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        fallback = %config.name,
                        strategy = config.strategy.as_str(),
                        error = %error,
                        "applying fallback"
                    );
                    #[cfg(feature = "metrics")]
                    counter!("fallback_calls_total", "fallback" => config.name.clone(), "result" => "applied")
                        .increment(1);

                    let response = config.strategy.apply(&error);
                    config.event_listeners.emit(&FallbackEvent::Applied {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        error,
                    });
                    Ok(response)
                }
            }
        })
    }
}
