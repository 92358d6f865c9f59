//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from every tier.

use std::sync::Weak;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCache;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `interval` between runs and holds only a weak
/// reference, so it exits on its own once the cache is dropped.
///
/// # Arguments
/// * `cache` - Weak reference to the cache to sweep
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which `TieredCache::dispose` aborts.
pub fn spawn_cleanup_task<V>(cache: Weak<TieredCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping expiry sweep");
                break;
            };

            let report = cache.cleanup().await;

            if report.total() > 0 {
                info!(
                    memory = report.memory,
                    persistent = report.persistent,
                    structured = report.structured,
                    "Expiry sweep: removed {} expired entries",
                    report.total()
                );
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
