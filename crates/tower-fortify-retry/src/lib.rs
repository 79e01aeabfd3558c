//! Retry policy for Tower services.
//!
//! Re-invokes the wrapped operation when it fails with one of the handled
//! [`ErrorKind`](tower_fortify_core::ErrorKind)s, up to a fixed number of total
//! attempts, waiting between attempts according to an [`IntervalFunction`].
//!
//! # Behavior
//!
//! - Success returns immediately.
//! - A failure of an unhandled kind is returned immediately, without retrying.
//! - A handled failure is retried while attempts remain. The `on_retry`
//!   callback fires before the wait.
//! - When attempts run out, the last failure is returned unchanged.
//!
//! `max_attempts` counts total attempts, so `max_attempts(1)` never retries.
//!
//! # Backoff
//!
//! - [`ZeroInterval`]: retry immediately (default)
//! - [`FixedInterval`]: constant wait
//! - [`ExponentialBackoff`]: `initial * multiplier^n`, optionally capped
//! - [`ExponentialRandomBackoff`]: exponential with seedable jitter
//! - [`FnInterval`]: any closure
//!
//! # Examples
//!
//! ```
//! use tower_fortify_core::{ClassifiedError, ErrorKind};
//! use tower_fortify_retry::RetryLayer;
//! use tower::ServiceBuilder;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let retry = RetryLayer::handle(ErrorKind::Transient)
//!     .max_attempts(5)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .on_retry(|err, attempt, delay| {
//!         println!("retry {} after {:?}: {}", attempt, delay, err);
//!     })
//!     .build()
//!     .unwrap();
//!
//! let service = ServiceBuilder::new()
//!     .layer(retry)
//!     .service(tower::service_fn(|req: String| async move {
//!         Ok::<_, ClassifiedError>(format!("echo: {}", req))
//!     }));
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `metrics`: `retry_calls_total` and `retry_attempts_total` counters
//! - `tracing`: log retries and outcomes with the `tracing` crate

mod backoff;
mod config;
mod events;
mod layer;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
    ZeroInterval,
};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use layer::RetryLayer;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Service, ServiceExt};
use tower_fortify_core::ClassifiedError;

/// A Tower [`Service`] that retries handled failures of its inner service.
pub struct Retry<S> {
    inner: S,
    config: Arc<RetryConfig>,
}

impl<S> Retry<S> {
    /// Creates a new `Retry` service wrapping the given service.
    pub fn new(inner: S, config: Arc<RetryConfig>) -> Self {
        Self { inner, config }
    }
}

impl<S> Clone for Retry<S>
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

impl<S, Req> Service<Req> for Retry<S>
where
    S: Service<Req, Error = ClassifiedError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = ClassifiedError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The clone is not necessarily ready; the readied service is swapped in.
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let mut attempt = 0;

            loop {
                let result = if attempt == 0 {
                    service.call(req.clone()).await
                } else {
                    match service.ready().await {
                        Ok(ready) => ready.call(req.clone()).await,
                        Err(error) => Err(error),
                    }
                };

                match result {
                    Ok(response) => {
                        #[cfg(feature = "tracing")]
                        {
                            if attempt > 0 {
                                tracing::debug!(
                                    retry = %config.name,
                                    attempts = attempt + 1,
                                    "operation succeeded after retrying"
                                );
                            }
                        }
                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "success")
                            .increment(1);

                        config.event_listeners.emit(&RetryEvent::Success {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });
                        return Ok(response);
                    }
                    Err(error) if !config.handled.matches(&error) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            retry = %config.name,
                            kind = %error.kind(),
                            "failure kind not handled, passing through"
                        );
                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "ignored")
                            .increment(1);

                        config.event_listeners.emit(&RetryEvent::IgnoredError {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            error: error.clone(),
                        });
                        return Err(error);
                    }
                    Err(error) => {
                        if attempt + 1 >= config.max_attempts {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                retry = %config.name,
                                attempts = attempt + 1,
                                error = %error,
                                "retries exhausted"
                            );
                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted")
                                .increment(1);

                            config.event_listeners.emit(&RetryEvent::Exhausted {
                                policy_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: attempt + 1,
                                error: error.clone(),
                            });
                            return Err(error);
                        }

                        let delay = config.interval_fn.next_interval(attempt);

                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            retry = %config.name,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying after handled failure"
                        );
                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                        config.event_listeners.emit(&RetryEvent::Retry {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt: attempt + 1,
                            delay,
                            error,
                        });

                        config.sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}
