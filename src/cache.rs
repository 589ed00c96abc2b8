//! Bounded, insertion-ordered response cache.
//!
//! Entries are evicted strictly in insertion order (FIFO): reads never promote a
//! key and overwriting a key keeps its original position. The backing store is an
//! `LruCache` that is only ever touched through its non-promoting accessors
//! (`peek`, `peek_mut`, `contains`, `push` for new keys), so its "least recently
//! used" end is always the oldest insertion.
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache capacity must be at least 1")]
    ZeroCapacity,
}

/// Fixed-capacity key/value store with FIFO eviction.
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq + Clone, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(CacheError::ZeroCapacity)?;
        Ok(Self {
            entries: LruCache::new(capacity),
        })
    }

    /// Look up `key` without changing its eviction position.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.peek(key)
    }

    /// Whether `key` is cached. Does not affect eviction order.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Insert or overwrite `key`.
    ///
    /// Overwriting keeps the key's eviction position. Inserting a new key into a
    /// full cache evicts the oldest-inserted key, which is returned.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        if let Some(slot) = self.entries.peek_mut(&key) {
            *slot = value;
            return None;
        }
        self.entries.push(key, value).map(|(evicted, _)| evicted)
    }

    /// Remove `key`, returning its value if it was present.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.pop(key)
    }

    /// Remove every key matching `predicate`. Returns how many were removed.
    pub fn invalidate_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }

    /// Remove every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently held (never above `capacity`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}
