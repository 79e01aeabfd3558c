//! Cache storage capability and the in-memory store.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tower_fortify_core::{Clock, Instant, SharedClock, TokioClock};

/// A stored value with the time it was written and how long it stays valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    /// The key the value was stored under.
    pub key: String,
    /// The cached value.
    pub value: V,
    /// When the value was stored.
    pub stored_at: Instant,
    /// How long the value may be served.
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Returns `true` while `now - stored_at < ttl`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// A key-value store the cache policy reads from and writes to.
///
/// Implementations synchronise internally; the policy calls them from many
/// tasks at once.
pub trait CacheStore<V>: Send + Sync {
    /// Returns the entry stored under `key`, fresh or not.
    fn get(&self, key: &str) -> Option<CacheEntry<V>>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: V, ttl: Duration);

    /// Removes the entry stored under `key`.
    fn evict(&self, key: &str);
}

impl<V, T> CacheStore<V> for Arc<T>
where
    T: CacheStore<V> + ?Sized,
{
    fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        (**self).set(key, value, ttl)
    }

    fn evict(&self, key: &str) {
        (**self).evict(key)
    }
}

/// Bounded in-memory store with least-recently-used eviction.
///
/// Entries are timestamped with the store's clock.
pub struct MemoryStore<V> {
    entries: Mutex<lru::LruCache<String, CacheEntry<V>>>,
    clock: SharedClock,
}

impl<V> MemoryStore<V> {
    /// Default number of entries kept before the least recently used is dropped.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, TokioClock)
    }

    /// Creates a store that timestamps entries with `clock`.
    pub fn with_clock<C>(capacity: usize, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self::with_shared_clock(capacity, Arc::new(clock))
    }

    pub(crate) fn with_shared_clock(capacity: usize, clock: SharedClock) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(lru::LruCache::new(capacity)),
            clock,
        }
    }

    /// Number of entries currently held, fresh or expired.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, lru::LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.lock().put(key.to_string(), entry);
    }

    fn evict(&self, key: &str) {
        self.lock().pop(key);
    }
}

impl<V> fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("MemoryStore")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}
