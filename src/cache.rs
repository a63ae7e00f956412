use crate::compiled::CompiledExpression;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Capacity used by `ParseService::new`.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

enum Store {
    Unbounded(DashMap<String, Arc<CompiledExpression>>),
    Bounded(Mutex<LruCache<String, Arc<CompiledExpression>>>),
}

/// Compiled expressions keyed by trimmed source text.
pub struct ExpressionCache {
    store: Store,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ExpressionCache {
    /// Grows without limit.
    pub fn unbounded() -> Self {
        Self::with_store(Store::Unbounded(DashMap::new()))
    }

    /// Keeps at most `capacity` entries, evicting the least recently used.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self::with_store(Store::Bounded(Mutex::new(LruCache::new(capacity))))
    }

    fn with_store(store: Store) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<CompiledExpression>> {
        let found = match &self.store {
            Store::Unbounded(map) => map.get(key).map(|entry| Arc::clone(entry.value())),
            Store::Bounded(lru) => lru.lock().get(key).cloned(),
        };
        match &found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("expression cache hit: {}", key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        found
    }

    /// Store `value` under `key` unless another caller got there first; returns the stored entry.
    pub fn insert(&self, key: String, value: Arc<CompiledExpression>) -> Arc<CompiledExpression> {
        match &self.store {
            Store::Unbounded(map) => Arc::clone(map.entry(key).or_insert(value).value()),
            Store::Bounded(lru) => {
                let mut lru = lru.lock();
                if let Some(existing) = lru.get(&key) {
                    return Arc::clone(existing);
                }
                if let Some((evicted, _)) = lru.push(key, Arc::clone(&value)) {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    log::debug!("evicted cached expression: {}", evicted);
                }
                value
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.store {
            Store::Unbounded(map) => map.len(),
            Store::Bounded(lru) => lru.lock().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self.store, Store::Bounded(_))
    }

    /// Drop every entry and reset the statistics.
    pub fn clear(&self) {
        match &self.store {
            Store::Unbounded(map) => map.clear(),
            Store::Bounded(lru) => lru.lock().clear(),
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::bounded(DEFAULT_CACHE_CAPACITY)
    }
}
