//! Tiered Cache - A three-tier key/value cache
//!
//! Layers an in-process memory tier over a persistent key-value store and a
//! large-capacity structured store, with TTL expiration, promotion of
//! slower-tier hits into memory, and a periodic expiry sweep.

pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod storage;
pub mod tasks;

pub use cache::{CacheStats, CleanupReport, TieredCache};
pub use config::Config;
pub use error::{CacheError, Result, StoreError};
pub use notify::{LogNotifier, Notifier};
pub use storage::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, NullKeyValueStore,
    NullStructuredStore, SqliteStore, StoredRecord, StructuredStore, Tier, TierPreference,
};
pub use tasks::spawn_cleanup_task;
