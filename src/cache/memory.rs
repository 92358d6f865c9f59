//! Memory Tier Module
//!
//! Fixed-capacity in-process tier combining a HashMap with insertion-order
//! tracking and TTL expiration.

use std::collections::HashMap;

use crate::cache::entry::is_expired_at;
use crate::cache::{CacheEntry, InsertionOrder};

// == Memory Tier ==
/// In-process tier with FIFO eviction at capacity.
///
/// Eviction follows insertion order, not access recency.
#[derive(Debug)]
pub struct MemoryTier<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order tracker
    order: InsertionOrder,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<V: Clone> MemoryTier<V> {
    // == Constructor ==
    /// Creates a new MemoryTier holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            capacity,
        }
    }

    // == Insert ==
    /// Stores an entry, overwriting any previous entry for the same key.
    ///
    /// A new key at capacity evicts the oldest inserted entries first.
    /// Returns the number of evicted entries.
    pub fn insert(&mut self, entry: CacheEntry<V>) -> usize {
        if self.capacity == 0 {
            return 0;
        }

        let mut evicted = 0;
        if !self.entries.contains_key(&entry.key) {
            while self.entries.len() >= self.capacity {
                match self.order.evict_oldest() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }

        self.order.record_insert(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
        evicted
    }

    // == Get ==
    /// Retrieves a live entry by key.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            self.remove(key);
            return None;
        }
        Some(entry.clone())
    }

    // == Remove ==
    /// Removes an entry by key. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.order.remove(key);
        self.entries.remove(key).is_some()
    }

    // == Cleanup Expired ==
    /// Removes all entries with `expiry_timestamp <= now`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, now: i64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| is_expired_at(entry.expiry_timestamp, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove(key);
        }
        expired_keys.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::current_timestamp_ms;
    use std::thread::sleep;
    use std::time::Duration;

    fn entry(key: &str, value: i32) -> CacheEntry<i32> {
        CacheEntry::new(key, value, Duration::from_secs(300))
    }

    #[test]
    fn test_memory_new() {
        let tier: MemoryTier<i32> = MemoryTier::new(100);
        assert_eq!(tier.len(), 0);
        assert!(tier.is_empty());
        assert_eq!(tier.capacity(), 100);
    }

    #[test]
    fn test_insert_and_get() {
        let mut tier = MemoryTier::new(100);

        tier.insert(entry("key1", 1));

        assert_eq!(tier.get("key1").map(|e| e.value), Some(1));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let mut tier: MemoryTier<i32> = MemoryTier::new(100);
        assert!(tier.get("nonexistent").is_none());
    }

    #[test]
    fn test_overwrite() {
        let mut tier = MemoryTier::new(100);

        tier.insert(entry("key1", 1));
        tier.insert(entry("key1", 2));

        assert_eq!(tier.get("key1").map(|e| e.value), Some(2));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_ttl_expiration_removes_entry() {
        let mut tier = MemoryTier::new(100);

        tier.insert(CacheEntry::new("key1", 1, Duration::from_millis(100)));
        assert!(tier.get("key1").is_some());

        sleep(Duration::from_millis(150));

        assert!(tier.get("key1").is_none());
        assert!(tier.is_empty());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut tier = MemoryTier::new(2);

        assert_eq!(tier.insert(entry("a", 1)), 0);
        assert_eq!(tier.insert(entry("b", 2)), 0);
        assert_eq!(tier.insert(entry("c", 3)), 1);

        assert_eq!(tier.len(), 2);
        assert!(tier.get("a").is_none());
        assert!(tier.get("b").is_some());
        assert!(tier.get("c").is_some());
    }

    #[test]
    fn test_reads_do_not_protect_from_eviction() {
        let mut tier = MemoryTier::new(2);

        tier.insert(entry("a", 1));
        tier.insert(entry("b", 2));
        tier.get("a");
        tier.insert(entry("c", 3));

        assert!(tier.get("a").is_none());
        assert!(tier.get("b").is_some());
    }

    #[test]
    fn test_overwrite_at_capacity_does_not_evict() {
        let mut tier = MemoryTier::new(2);

        tier.insert(entry("a", 1));
        tier.insert(entry("b", 2));
        assert_eq!(tier.insert(entry("a", 10)), 0);

        assert_eq!(tier.len(), 2);
        // "a" was re-inserted, so "b" is now the oldest
        tier.insert(entry("c", 3));
        assert!(tier.get("b").is_none());
        assert_eq!(tier.get("a").map(|e| e.value), Some(10));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut tier = MemoryTier::new(0);
        tier.insert(entry("a", 1));
        assert!(tier.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut tier = MemoryTier::new(100);

        tier.insert(entry("key1", 1));
        assert!(tier.remove("key1"));
        assert!(!tier.remove("key1"));
        assert!(tier.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let mut tier = MemoryTier::new(100);
        let now = current_timestamp_ms();

        tier.insert(CacheEntry::with_expiry("stale", 1, now - 1));
        tier.insert(CacheEntry::with_expiry("boundary", 2, now));
        tier.insert(CacheEntry::with_expiry("live", 3, now + 60_000));

        let removed = tier.cleanup_expired(now);
        assert_eq!(removed, 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.get("live").is_some());
    }

    #[test]
    fn test_clear() {
        let mut tier = MemoryTier::new(100);
        tier.insert(entry("a", 1));
        tier.insert(entry("b", 2));

        tier.clear();

        assert!(tier.is_empty());
        assert!(tier.get("a").is_none());
    }
}
