//! Capacity-bounded LRU cache with a per-entry time-to-live.
//!
//! Not synchronized; wrap it in a mutex when shared.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V> TtlCache<K, V> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Get a live entry. Expired entries are evicted on access.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, resetting the entry's age. Evicts the least
    /// recently used entry when full.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Includes expired entries not yet evicted.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
