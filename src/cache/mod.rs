//! Cache Module
//!
//! Provides the three-tier cache with TTL expiration and FIFO eviction in
//! the memory tier.

mod entry;
mod memory;
mod order;
mod stats;
mod tiered;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, PersistedRecord};
pub use memory::MemoryTier;
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use tiered::{CleanupReport, TieredCache};

// == Public Constants ==
/// Default memory tier capacity in items
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// Default TTL in milliseconds (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Default interval between expiry sweeps, in seconds
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Largest serialized record, in characters, written to the persistent tier
pub const MAX_PERSISTENT_ITEM_SIZE: usize = 5_000_000;

/// Default namespace prefix in the persistent key-value tier
pub const DEFAULT_PREFIX: &str = "cache";

/// Default table name in the structured tier
pub const DEFAULT_STORE_NAME: &str = "cache_store";
