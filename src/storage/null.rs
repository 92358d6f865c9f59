//! Stand-ins for tiers that are disabled or not supported by the host.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::storage::{KeyValueStore, StoredRecord, StructuredStore};

/// Persistent tier that is switched off.
///
/// Reads miss, writes fail as unavailable so the cache reroutes them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeyValueStore;

impl KeyValueStore for NullKeyValueStore {
    fn name(&self) -> &'static str {
        "null-kv"
    }

    fn read(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable(
            "persistent key-value store disabled".to_string(),
        ))
    }

    fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Structured tier for runtimes without one. Fails to open, which puts the
/// cache in two-tier mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStructuredStore;

#[async_trait]
impl StructuredStore for NullStructuredStore {
    fn name(&self) -> &'static str {
        "null-structured"
    }

    async fn open(&self) -> StoreResult<()> {
        Err(StoreError::Unavailable(
            "structured store not supported".to_string(),
        ))
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<StoredRecord>> {
        Ok(None)
    }

    async fn put(&self, _record: StoredRecord) -> StoreResult<()> {
        Err(StoreError::Unavailable(
            "structured store not supported".to_string(),
        ))
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn delete_expired(&self, _now: i64) -> StoreResult<usize> {
        Ok(0)
    }

    async fn clear(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_kv_rejects_writes() {
        let store = NullKeyValueStore;
        assert!(matches!(
            store.write("a", "1"),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.read("a").unwrap(), None);
        assert!(store.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_structured_fails_to_open() {
        let store = NullStructuredStore;
        assert!(matches!(store.open().await, Err(StoreError::Unavailable(_))));
        assert_eq!(store.get("a").await.unwrap(), None);
    }
}
