//! Cache Statistics Module
//!
//! Tracks cache performance metrics including per-tier hits, misses,
//! promotions and evictions.

use serde::Serialize;

use crate::storage::Tier;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (not found in any tier or expired)
    pub misses: u64,
    /// Hits served by the memory tier
    pub memory_hits: u64,
    /// Hits served by the persistent key-value tier
    pub persistent_hits: u64,
    /// Hits served by the structured tier
    pub structured_hits: u64,
    /// Values copied into the memory tier after a slower-tier hit
    pub promotions: u64,
    /// Entries evicted from the memory tier at capacity
    pub evictions: u64,
    /// Persistent-tier writes rerouted to the structured tier
    pub redirects: u64,
    /// Unparseable records found and deleted
    pub corrupt_records: u64,
    /// Current number of entries in the memory tier
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter and the counter of the tier that served it.
    pub fn record_hit(&mut self, tier: Tier) {
        self.hits += 1;
        match tier {
            Tier::Memory => self.memory_hits += 1,
            Tier::Persistent => self.persistent_hits += 1,
            Tier::Structured => self.structured_hits += 1,
        }
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_redirect(&mut self) {
        self.redirects += 1;
    }

    pub fn record_corrupt(&mut self) {
        self.corrupt_records += 1;
    }

    // == Update Entry Count ==
    /// Updates the memory tier entry count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
