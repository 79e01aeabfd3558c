use crate::events::CacheEvent;
use crate::store::{CacheStore, MemoryStore};
use crate::CacheLayer;
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::events::{EventListeners, FnListener};
use tower_fortify_core::{ClassifiedError, Clock, ConfigError, Context, SharedClock, TokioClock};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Where the cache key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The context's operation key.
    OperationKey,
    /// A named context item.
    Item(String),
}

impl KeySource {
    /// Reads the key from `context`.
    pub fn key(&self, context: &Context) -> Option<String> {
        match self {
            KeySource::OperationKey => context.operation_key().map(str::to_string),
            KeySource::Item(name) => context.get(name).map(str::to_string),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            KeySource::OperationKey => "operation key".to_string(),
            KeySource::Item(name) => format!("context item '{}'", name),
        }
    }
}

/// Configuration for the cache policy.
pub struct CacheConfig<V> {
    pub(crate) store: Arc<dyn CacheStore<V>>,
    pub(crate) ttl: Duration,
    pub(crate) key_source: KeySource,
    pub(crate) clock: SharedClock,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
    pub(crate) name: String,
}

impl<V> CacheConfig<V> {
    /// Time-to-live given to every stored result.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Where keys are read from.
    pub fn key_source(&self) -> &KeySource {
        &self.key_source
    }

    /// Instance name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`CacheLayer`].
pub struct CacheConfigBuilder<V> {
    store: Option<Arc<dyn CacheStore<V>>>,
    max_size: usize,
    ttl: Option<Duration>,
    key_source: KeySource,
    clock: Option<SharedClock>,
    event_listeners: EventListeners<CacheEvent>,
    name: String,
}

impl<V> CacheConfigBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder.
    ///
    /// Defaults:
    /// - store: [`MemoryStore`] holding 1024 entries
    /// - key: the context's operation key
    /// - name: `"<unnamed>"`
    ///
    /// The TTL has no default and must be set.
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            metrics::describe_counter!(
                "cache_requests_total",
                "Total number of cache lookups, by result (hit, miss, error)"
            );
        });

        Self {
            store: None,
            max_size: MemoryStore::<V>::DEFAULT_CAPACITY,
            ttl: None,
            key_source: KeySource::OperationKey,
            clock: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Uses `store` instead of the default in-memory store.
    pub fn store<St>(mut self, store: St) -> Self
    where
        St: CacheStore<V> + 'static,
    {
        self.store = Some(Arc::new(store));
        self
    }

    /// Capacity of the default in-memory store. Ignored when a store is given.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// How long a stored result may be served. Required; must be greater than zero.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Keys entries by the context's operation key.
    pub fn key_from_operation_key(mut self) -> Self {
        self.key_source = KeySource::OperationKey;
        self
    }

    /// Keys entries by the named context item.
    pub fn key_from_item(mut self, name: impl Into<String>) -> Self {
        self.key_source = KeySource::Item(name.into());
        self
    }

    /// Replaces the clock used to judge freshness and to timestamp entries
    /// in the default store.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Sets the name for this cache (used in events).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a fresh entry is served.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Hit { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked when no fresh entry exists.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Miss { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked when a result is stored.
    pub fn on_add<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Added { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked when a call fails and nothing is stored.
    ///
    /// The key is `None` when the context did not carry one.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>, &ClassifiedError) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Error { key, error, .. } = event {
                f(key.as_deref(), error);
            }
        }));
        self
    }

    /// Validates the configuration and builds the layer.
    pub fn build(self) -> Result<CacheLayer<V>, ConfigError> {
        let ttl = self.ttl.ok_or(ConfigError::Missing { field: "ttl" })?;
        let ttl = ConfigError::require_positive("ttl", ttl)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));

        let store: Arc<dyn CacheStore<V>> = match self.store {
            Some(store) => store,
            None => {
                let max_size = ConfigError::require_nonzero("max_size", self.max_size)?;
                Arc::new(MemoryStore::with_shared_clock(max_size, Arc::clone(&clock)))
            }
        };

        Ok(CacheLayer::new(CacheConfig {
            store,
            ttl,
            key_source: self.key_source,
            clock,
            event_listeners: self.event_listeners,
            name: self.name,
        }))
    }
}

impl<V> Default for CacheConfigBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
