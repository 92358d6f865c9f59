//! Tiered Cache Module
//!
//! Main cache engine layering the memory tier over the persistent key-value
//! tier and the structured tier, with TTL expiration and tier promotion.
//!
//! Storage failures never escape: they are logged and the operation degrades
//! to the next tier or to a no-op. The only error returned is a failing
//! producer in [`TieredCache::get_or_set`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::entry::{current_timestamp_ms, is_expired_at, PersistedRecord};
use crate::cache::{CacheEntry, CacheStats, MemoryTier};
use crate::config::Config;
use crate::error::{CacheError, Result, StoreError, StoreResult};
use crate::notify::{LogNotifier, Notifier};
use crate::storage::{
    KeyValueStore, StoredRecord, StructuredStore, Tier, TierOutcome, TierPreference,
};
use crate::tasks::spawn_cleanup_task;

// == Cleanup Report ==
/// Number of expired entries removed from each tier by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub memory: usize,
    pub persistent: usize,
    pub structured: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.memory + self.persistent + self.structured
    }
}

/// Memory tier and statistics, guarded together.
struct MemoryState<V> {
    memory: MemoryTier<V>,
    stats: CacheStats,
}

// == Tiered Cache ==
/// Key/value cache over memory, persistent key-value, and structured tiers.
///
/// Construct with [`TieredCache::new`], wrap in an `Arc`, then call
/// [`TieredCache::init`]. Until `init` succeeds in opening the structured
/// store, the cache runs on the memory and persistent tiers only.
pub struct TieredCache<V> {
    config: Config,
    state: RwLock<MemoryState<V>>,
    persistent: Arc<dyn KeyValueStore>,
    structured: Arc<dyn StructuredStore>,
    /// Set once by `init` when the structured store opened
    structured_ready: AtomicBool,
    /// Persistent-tier key namespace derived from `config.prefix`
    namespace: String,
    notifier: Arc<dyn Notifier>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache over the given backing stores.
    ///
    /// # Arguments
    /// * `config` - Capacity, TTL, sweep, size limit and namespace settings
    /// * `persistent` - Store for the persistent key-value tier
    /// * `structured` - Store for the large-capacity tier
    pub fn new(
        config: Config,
        persistent: Arc<dyn KeyValueStore>,
        structured: Arc<dyn StructuredStore>,
    ) -> Self {
        let namespace = config.namespace();
        if namespace != config.prefix {
            warn!(
                prefix = %config.prefix,
                namespace = %namespace,
                "Key prefix contains '_', using sanitized namespace"
            );
        }
        Self {
            namespace,
            state: RwLock::new(MemoryState {
                memory: MemoryTier::new(config.memory_capacity),
                stats: CacheStats::new(),
            }),
            config,
            persistent,
            structured,
            structured_ready: AtomicBool::new(false),
            notifier: Arc::new(LogNotifier),
            sweeper: Mutex::new(None),
        }
    }

    /// Replaces the notifier used for degraded-mode warnings.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// True while the structured tier is unavailable.
    pub fn is_degraded(&self) -> bool {
        !self.structured_ready.load(Ordering::Acquire)
    }

    // == Lifecycle ==
    /// Opens the structured store and starts the periodic expiry sweep.
    ///
    /// If the structured store cannot be opened the cache stays in two-tier
    /// mode for its lifetime; this is logged and notified once here.
    pub async fn init(self: &Arc<Self>) {
        match self.structured.open().await {
            Ok(()) => {
                self.structured_ready.store(true, Ordering::Release);
                info!(store = self.structured.name(), "Structured tier ready");
            }
            Err(e) => {
                self.structured_ready.store(false, Ordering::Release);
                warn!(
                    store = self.structured.name(),
                    error = %e,
                    "Structured tier unavailable, running in two-tier mode"
                );
                self.notifier
                    .warn("Cache is running without large-capacity storage");
            }
        }

        if let Some(interval) = self.config.cleanup_interval() {
            let handle = spawn_cleanup_task(Arc::downgrade(self), interval);
            if let Some(previous) = self.sweeper.lock().await.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Stops the periodic sweep. Stored data is left in place.
    pub async fn dispose(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
            info!("Expiry sweep stopped");
        }
    }

    // == Get ==
    /// Retrieves a live value, consulting memory, persistent, then structured tier.
    ///
    /// A hit in a slower tier is promoted into the memory tier with its
    /// original expiry. Expired and corrupt records found along the way are
    /// deleted. Returns None on a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let mut state = self.state.write().await;
            if let Some(entry) = state.memory.get(key) {
                state.stats.record_hit(Tier::Memory);
                return Some(entry.value);
            }
        }

        match self.read_persistent(key) {
            TierOutcome::Hit(entry) => return Some(self.promote(entry, Tier::Persistent).await),
            TierOutcome::Miss => {}
            TierOutcome::Degraded(e) => self.absorb(Tier::Persistent, key, e).await,
        }

        match self.read_structured(key).await {
            TierOutcome::Hit(entry) => return Some(self.promote(entry, Tier::Structured).await),
            TierOutcome::Miss => {}
            TierOutcome::Degraded(e) => self.absorb(Tier::Structured, key, e).await,
        }

        self.state.write().await.stats.record_miss();
        None
    }

    /// Reads the memory tier only, without touching slower tiers.
    pub async fn get_from_memory(&self, key: &str) -> Option<V> {
        self.state.write().await.memory.get(key).map(|e| e.value)
    }

    // == Set ==
    /// Stores a value in the memory tier and the tiers named by `tier`.
    ///
    /// A persistent-tier write that is over the item size limit, over quota,
    /// or unavailable is redirected to the structured tier. In two-tier mode
    /// structured writes go to the persistent tier instead. Tiers not written
    /// drop any older copy of the key so a stale value cannot shadow this one.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - Time to live (uses the configured default if None)
    /// * `tier` - Which slower tiers to write through to
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>, tier: TierPreference) {
        let ttl = ttl.unwrap_or_else(|| self.config.default_ttl());
        let entry = CacheEntry::new(key, value, ttl);

        {
            let mut state = self.state.write().await;
            let evicted = state.memory.insert(entry.clone());
            state.stats.record_evictions(evicted);
        }

        let mut to_structured = tier.includes_structured();
        let mut redirected = false;
        let mut in_persistent = false;
        if tier.includes_persistent() {
            match self.write_persistent(&entry) {
                Ok(()) => in_persistent = true,
                Err(e) if e.is_redirectable() => {
                    debug!(key = %key, error = %e, "Redirecting write to structured tier");
                    redirected = true;
                    to_structured = true;
                }
                Err(e) => self.absorb(Tier::Persistent, key, e).await,
            }
        } else if to_structured && self.is_degraded() {
            // Two-tier mode: the persistent tier stands in for the structured one
            match self.write_persistent(&entry) {
                Ok(()) => in_persistent = true,
                Err(e) => self.absorb(Tier::Persistent, key, e).await,
            }
        }

        if !in_persistent {
            self.delete_persistent(key);
        }

        if to_structured {
            match self.write_structured(&entry).await {
                Ok(()) if redirected => self.state.write().await.stats.record_redirect(),
                Ok(()) => {}
                Err(e) => {
                    self.absorb(Tier::Structured, key, e).await;
                    // A failed write must leave a miss, not the previous value
                    self.delete_structured(key).await;
                }
            }
        } else {
            self.delete_structured(key).await;
        }
    }

    // == Get Or Set ==
    /// Returns the cached value, or produces, stores and returns a new one.
    ///
    /// `producer` runs only on a miss. Concurrent misses on the same key may
    /// each run their producer; the last write wins.
    ///
    /// # Errors
    /// [`CacheError::ProducerFailure`] if `producer` fails. Nothing is stored.
    pub async fn get_or_set<F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
        tier: TierPreference,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<anyhow::Error>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = producer()
            .await
            .map_err(|e| CacheError::ProducerFailure(e.into()))?;
        self.set(key, value.clone(), ttl, tier).await;
        Ok(value)
    }

    // == Remove ==
    /// Deletes the key from every tier. Absent keys are ignored.
    pub async fn remove(&self, key: &str) {
        self.state.write().await.memory.remove(key);
        self.delete_persistent(key);
        self.delete_structured(key).await;
    }

    // == Clear ==
    /// Empties the memory tier, this cache's namespace in the persistent tier,
    /// and this cache's collection in the structured tier.
    pub async fn clear(&self) {
        self.state.write().await.memory.clear();

        match self.persistent.keys() {
            Ok(keys) => {
                let prefix = self.namespace_prefix();
                for storage_key in keys.iter().filter(|k| k.starts_with(&prefix)) {
                    if let Err(e) = self.persistent.delete(storage_key) {
                        warn!(key = %storage_key, error = %e, "Failed to clear persistent entry");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to enumerate persistent tier"),
        }

        if !self.is_degraded() {
            if let Err(e) = self.structured.clear().await {
                warn!(error = %e, "Failed to clear structured tier");
            }
        }
        info!("Cache cleared");
    }

    // == Cleanup ==
    /// Removes every entry with `expiry_timestamp <= now` from all tiers.
    ///
    /// The structured tier is swept with one range delete on its expiry index.
    pub async fn cleanup(&self) -> CleanupReport {
        let now = current_timestamp_ms();

        let memory = self.state.write().await.memory.cleanup_expired(now);
        let persistent = self.cleanup_persistent(now);
        let structured = if self.is_degraded() {
            0
        } else {
            match self.structured.delete_expired(now).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "Structured tier sweep failed");
                    0
                }
            }
        };

        CleanupReport {
            memory,
            persistent,
            structured,
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.memory.len());
        stats
    }

    // == Persistent Tier ==
    fn namespace_prefix(&self) -> String {
        format!("{}_", self.namespace)
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}_{}", self.namespace, key)
    }

    fn read_persistent(&self, key: &str) -> TierOutcome<CacheEntry<V>> {
        let storage_key = self.storage_key(key);
        let raw = match self.persistent.read(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return TierOutcome::Miss,
            Err(e) => return TierOutcome::Degraded(e),
        };

        match serde_json::from_str::<PersistedRecord<V>>(&raw) {
            Ok(record) if is_expired_at(record.expiry_timestamp, current_timestamp_ms()) => {
                self.delete_persistent(key);
                TierOutcome::Miss
            }
            Ok(record) => TierOutcome::Hit(CacheEntry::with_expiry(
                key,
                record.value,
                record.expiry_timestamp,
            )),
            Err(source) => {
                self.delete_persistent(key);
                TierOutcome::Degraded(StoreError::CorruptRecord {
                    key: storage_key,
                    source,
                })
            }
        }
    }

    fn write_persistent(&self, entry: &CacheEntry<V>) -> StoreResult<()> {
        let storage_key = self.storage_key(&entry.key);
        let serialized =
            serde_json::to_string(&entry.to_record()).map_err(StoreError::Serialization)?;

        let size = serialized.chars().count();
        if size > self.config.max_item_size {
            return Err(StoreError::QuotaExceeded {
                key: storage_key,
                size,
                limit: self.config.max_item_size,
            });
        }

        self.persistent.write(&storage_key, &serialized)
    }

    fn delete_persistent(&self, key: &str) {
        if let Err(e) = self.persistent.delete(&self.storage_key(key)) {
            debug!(key = %key, error = %e, "Persistent delete failed");
        }
    }

    fn cleanup_persistent(&self, now: i64) -> usize {
        let keys = match self.persistent.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate persistent tier");
                return 0;
            }
        };

        let prefix = self.namespace_prefix();
        let mut removed = 0;
        for storage_key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            let expired = match self.persistent.read(storage_key) {
                Ok(Some(raw)) => {
                    match serde_json::from_str::<PersistedRecord<IgnoredAny>>(&raw) {
                        Ok(record) => is_expired_at(record.expiry_timestamp, now),
                        // Corrupt records go too
                        Err(_) => true,
                    }
                }
                Ok(None) => false,
                Err(e) => {
                    debug!(key = %storage_key, error = %e, "Persistent read failed during sweep");
                    false
                }
            };

            if expired {
                match self.persistent.delete(storage_key) {
                    Ok(()) => removed += 1,
                    Err(e) => debug!(key = %storage_key, error = %e, "Persistent delete failed"),
                }
            }
        }
        removed
    }

    // == Structured Tier ==
    async fn read_structured(&self, key: &str) -> TierOutcome<CacheEntry<V>> {
        if self.is_degraded() {
            return TierOutcome::Miss;
        }

        let record = match self.structured.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return TierOutcome::Miss,
            Err(e) => return TierOutcome::Degraded(e),
        };

        if is_expired_at(record.expiry, current_timestamp_ms()) {
            self.delete_structured(key).await;
            return TierOutcome::Miss;
        }

        match serde_json::from_str::<V>(&record.value) {
            Ok(value) => TierOutcome::Hit(CacheEntry::with_expiry(key, value, record.expiry)),
            Err(source) => {
                self.delete_structured(key).await;
                TierOutcome::Degraded(StoreError::CorruptRecord {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    async fn write_structured(&self, entry: &CacheEntry<V>) -> StoreResult<()> {
        if self.is_degraded() {
            return Err(StoreError::Unavailable(
                "structured tier disabled".to_string(),
            ));
        }

        let value = serde_json::to_string(&entry.value).map_err(StoreError::Serialization)?;
        self.structured
            .put(StoredRecord {
                key: entry.key.clone(),
                value,
                expiry: entry.expiry_timestamp,
            })
            .await
    }

    async fn delete_structured(&self, key: &str) {
        if self.is_degraded() {
            return;
        }
        if let Err(e) = self.structured.delete(key).await {
            debug!(key = %key, error = %e, "Structured delete failed");
        }
    }

    // == Helpers ==
    /// Copies a slower-tier hit into the memory tier, keeping its expiry.
    async fn promote(&self, entry: CacheEntry<V>, from: Tier) -> V {
        debug!(key = %entry.key, tier = %from, "Promoting to memory tier");
        let value = entry.value.clone();
        let mut state = self.state.write().await;
        let evicted = state.memory.insert(entry);
        state.stats.record_evictions(evicted);
        state.stats.record_hit(from);
        state.stats.record_promotion();
        value
    }

    /// Logs a storage failure that the cache recovers from locally.
    async fn absorb(&self, tier: Tier, key: &str, err: StoreError) {
        match err {
            StoreError::CorruptRecord { .. } => {
                warn!(key = %key, tier = %tier, error = %err, "Dropped corrupt record");
                self.state.write().await.stats.record_corrupt();
            }
            StoreError::Unavailable(_) => {
                debug!(key = %key, tier = %tier, error = %err, "Tier unavailable");
            }
            _ => warn!(key = %key, tier = %tier, error = %err, "Tier operation failed"),
        }
    }
}
