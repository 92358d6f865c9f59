//! Storage Module
//!
//! Backing stores for the two slower cache tiers.
//!
//! # Tiers
//! - Persistent key-value: synchronous string store ([`KeyValueStore`])
//! - Structured: asynchronous record store with an expiry index ([`StructuredStore`])
//!
//! Each trait has a null implementation standing in for a store that is
//! disabled or not supported by the host.

mod file;
mod kv;
mod null;
mod sqlite;

use std::fmt;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

pub use file::FileKeyValueStore;
pub use kv::MemoryKeyValueStore;
pub use null::{NullKeyValueStore, NullStructuredStore};
pub use sqlite::SqliteStore;

// == Tier ==
/// One of the three backing stores, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Memory,
    Persistent,
    Structured,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Memory => "memory",
            Tier::Persistent => "persistent",
            Tier::Structured => "structured",
        };
        f.write_str(name)
    }
}

// == Tier Preference ==
/// Which slower tiers a `set` writes through to.
///
/// The memory tier is always written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TierPreference {
    /// Memory tier only
    MemoryOnly,
    /// Memory and persistent key-value tier
    #[default]
    Persistent,
    /// Memory and structured tier
    Structured,
    /// Every tier
    All,
}

impl TierPreference {
    pub fn includes_persistent(self) -> bool {
        matches!(self, TierPreference::Persistent | TierPreference::All)
    }

    pub fn includes_structured(self) -> bool {
        matches!(self, TierPreference::Structured | TierPreference::All)
    }
}

// == Tier Outcome ==
/// Result of a lookup in one tier, passed between tiers before being
/// collapsed to an `Option` at the public API.
#[derive(Debug)]
pub(crate) enum TierOutcome<T> {
    /// Live value found
    Hit(T),
    /// Nothing usable in this tier
    Miss,
    /// Tier failed; the lookup continues with the next tier
    Degraded(StoreError),
}

// == Key-Value Store ==
/// Simple synchronous string store backing the persistent tier.
///
/// Writes over the store's quota fail with [`StoreError::QuotaExceeded`].
pub trait KeyValueStore: Send + Sync {
    /// A name for tracing.
    fn name(&self) -> &'static str;

    /// Returns the stored string, or None if absent.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores a string under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Deletes `key`. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Lists every stored key, including keys owned by other users of the store.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

// == Structured Record ==
/// Row shape in the structured tier: `{ key, value, expiry }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: String,
    /// Serialized JSON value
    pub value: String,
    /// Expiration timestamp (Unix milliseconds)
    pub expiry: i64,
}

// == Structured Store ==
/// Asynchronous store backing the large-capacity tier.
///
/// Records live in one collection dedicated to the cache, indexed on
/// `expiry` so expired records can be removed with a single range delete.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// A name for tracing.
    fn name(&self) -> &'static str;

    /// Opens the store. Called once by `TieredCache::init`.
    async fn open(&self) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<StoredRecord>>;

    /// Inserts or replaces the record for `record.key`.
    async fn put(&self, record: StoredRecord) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Deletes every record with `expiry <= now`. Returns how many were removed.
    async fn delete_expired(&self, now: i64) -> StoreResult<usize>;

    /// Deletes every record in the cache's collection.
    async fn clear(&self) -> StoreResult<()>;
}
