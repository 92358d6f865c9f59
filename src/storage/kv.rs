//! In-process key-value store with an optional size quota.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::storage::KeyValueStore;

/// HashMap-backed [`KeyValueStore`].
///
/// Usage is counted in characters of key plus value, matching how browser
/// style key-value stores account for their quota.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes once total usage would exceed `quota`.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| StoreError::Unavailable("key-value store lock poisoned".to_string()))
    }
}

fn item_size(key: &str, value: &str) -> usize {
    key.chars().count() + value.chars().count()
}

impl KeyValueStore for MemoryKeyValueStore {
    fn name(&self) -> &'static str {
        "memory-kv"
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut items = self.lock()?;

        if let Some(limit) = self.quota {
            let current: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| item_size(k, v))
                .sum();
            let size = current + item_size(key, value);
            if size > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
