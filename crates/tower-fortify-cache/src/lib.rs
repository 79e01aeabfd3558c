//! Result caching policy for Tower services.
//!
//! Wraps a service taking a [`Context`](tower_fortify_core::Context) and
//! serves successful results from a [`CacheStore`] for a fixed time-to-live.
//!
//! Per call:
//!
//! 1. The key is read from the context (operation key by default, or a named
//!    item). A context without a key fails with an
//!    [`ErrorKind::Unclassified`](tower_fortify_core::ErrorKind) error and the
//!    operation is not invoked.
//! 2. A fresh entry is returned as-is and the operation is not invoked.
//!    An expired entry is evicted and treated as absent.
//! 3. Otherwise the operation runs. Successes are stored; failures are
//!    propagated unchanged and never stored.
//!
//! Concurrent misses for the same key are not coalesced: each one invokes the
//! operation and the last write wins.
//!
//! # Examples
//!
//! ```
//! use tower_fortify_cache::CacheLayer;
//! use tower_fortify_core::{ClassifiedError, Context, PolicyExt};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let cache = CacheLayer::<u64>::builder()
//!     .ttl(Duration::from_secs(30))
//!     .on_miss(|key| println!("computing {}", key))
//!     .build()
//!     .unwrap();
//!
//! let price = cache
//!     .execute(Context::new("price:ACME"), |_ctx: Context| async {
//!         Ok::<_, ClassifiedError>(1234u64)
//!     })
//!     .await;
//! assert_eq!(price.unwrap(), 1234);
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `metrics`: `cache_requests_total` counter labelled by result
//! - `tracing`: log hits, misses and errors

mod config;
mod events;
mod layer;
mod store;

pub use config::{CacheConfig, CacheConfigBuilder, KeySource};
pub use events::CacheEvent;
pub use layer::CacheLayer;
pub use store::{CacheEntry, CacheStore, MemoryStore};

use futures::future::{self, BoxFuture};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tower_fortify_core::{ClassifiedError, Context as PolicyContext};

/// A Tower [`Service`] that caches successful responses by context key.
pub struct Cache<S, V> {
    inner: S,
    config: Arc<CacheConfig<V>>,
}

impl<S, V> Cache<S, V> {
    /// Creates a new `Cache` wrapping the given service.
    pub fn new(inner: S, config: Arc<CacheConfig<V>>) -> Self {
        Self { inner, config }
    }
}

impl<S, V> Clone for Cache<S, V>
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

impl<S, V> Service<PolicyContext> for Cache<S, V>
where
    S: Service<PolicyContext, Response = V, Error = ClassifiedError>,
    S::Future: Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Response = V;
    type Error = ClassifiedError;
    type Future = BoxFuture<'static, Result<V, ClassifiedError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: PolicyContext) -> Self::Future {
        let config = Arc::clone(&self.config);

        let key = match config.key_source.key(&req) {
            Some(key) => key,
            None => {
                let error = ClassifiedError::unclassified(format!(
                    "cache '{}': context has no {}",
                    config.name,
                    config.key_source.describe()
                ));

                #[cfg(feature = "tracing")]
                tracing::warn!(cache = %config.name, error = %error, "cache key missing");
                #[cfg(feature = "metrics")]
                counter!("cache_requests_total", "cache" => config.name.clone(), "result" => "error")
                    .increment(1);

                config.event_listeners.emit(&CacheEvent::Error {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    key: None,
                    error: error.clone(),
                });
                return Box::pin(future::ready(Err(error)));
            }
        };

        match config.store.get(&key) {
            Some(entry) if entry.is_fresh(config.clock.now()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(cache = %config.name, key = %key, "cache hit");
                #[cfg(feature = "metrics")]
                counter!("cache_requests_total", "cache" => config.name.clone(), "result" => "hit")
                    .increment(1);

                config.event_listeners.emit(&CacheEvent::Hit {
                    policy_name: config.name.clone(),
                    timestamp: Instant::now(),
                    key,
                });
                return Box::pin(future::ready(Ok(entry.value)));
            }
            Some(_) => config.store.evict(&key),
            None => {}
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %config.name, key = %key, "cache miss");
        #[cfg(feature = "metrics")]
        counter!("cache_requests_total", "cache" => config.name.clone(), "result" => "miss")
            .increment(1);

        config.event_listeners.emit(&CacheEvent::Miss {
            policy_name: config.name.clone(),
            timestamp: Instant::now(),
            key: key.clone(),
        });

        let fut = self.inner.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(value) => {
                    config.store.set(&key, value.clone(), config.ttl);
                    config.event_listeners.emit(&CacheEvent::Added {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        key,
                    });
                    Ok(value)
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(cache = %config.name, key = %key, error = %error, "not caching failure");

                    config.event_listeners.emit(&CacheEvent::Error {
                        policy_name: config.name.clone(),
                        timestamp: Instant::now(),
                        key: Some(key),
                        error: error.clone(),
                    });
                    Err(error)
                }
            }
        })
    }
}
