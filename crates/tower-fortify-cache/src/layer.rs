use crate::config::{CacheConfig, CacheConfigBuilder};
use crate::Cache;
use std::sync::Arc;
use tower::Layer;
use tower_fortify_core::PolicyExt;

/// A Tower [`Layer`] that serves fresh results from a store keyed by the
/// request [`Context`](tower_fortify_core::Context).
///
/// The store lives in the layer, so every service produced by one layer
/// reads and writes the same entries.
///
/// ```rust
/// use tower_fortify_cache::CacheLayer;
/// use std::time::Duration;
///
/// let cache = CacheLayer::<String>::builder()
///     .ttl(Duration::from_secs(60))
///     .key_from_item("user")
///     .on_hit(|key| println!("hit {}", key))
///     .build()
///     .unwrap();
/// ```
pub struct CacheLayer<V> {
    config: Arc<CacheConfig<V>>,
}

impl<V> CacheLayer<V> {
    pub(crate) fn new(config: CacheConfig<V>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The validated configuration.
    pub fn config(&self) -> &CacheConfig<V> {
        &self.config
    }

    /// Drops the entry stored under `key`, if any.
    pub fn invalidate(&self, key: &str) {
        self.config.store.evict(key);
    }
}

impl<V> CacheLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts a builder.
    pub fn builder() -> CacheConfigBuilder<V> {
        CacheConfigBuilder::new()
    }
}

impl<V> Clone for CacheLayer<V> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, V> Layer<S> for CacheLayer<V> {
    type Service = Cache<S, V>;

    fn layer(&self, service: S) -> Self::Service {
        Cache::new(service, Arc::clone(&self.config))
    }
}

impl<V> PolicyExt for CacheLayer<V> {}

impl<V> std::fmt::Debug for CacheLayer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("name", &self.config.name)
            .field("ttl", &self.config.ttl)
            .field("key_source", &self.config.key_source)
            .finish()
    }
}
