//! SQLite-backed structured store.
//!
//! One table per cache, keyed by cache key, with a secondary index on
//! `expiry`. Blocking SQLite calls run on tokio's blocking pool.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::storage::{StoredRecord, StructuredStore};

#[derive(Debug, Clone)]
enum Location {
    Memory,
    Path(PathBuf),
}

/// [`StructuredStore`] on an embedded SQLite database.
pub struct SqliteStore {
    location: Location,
    table: String,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Store in a private in-memory database, lost when dropped.
    pub fn in_memory(store_name: impl Into<String>) -> Self {
        Self::new(Location::Memory, store_name.into())
    }

    /// Store in a database file, created on `open` if missing.
    pub fn at_path(path: impl Into<PathBuf>, store_name: impl Into<String>) -> Self {
        Self::new(Location::Path(path.into()), store_name.into())
    }

    fn new(location: Location, table: String) -> Self {
        Self {
            location,
            table,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs `f` against the open connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();

        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| StoreError::Unavailable("store not opened".to_string()))?;
            f(conn, &table).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }
}

/// Table names are interpolated into SQL, so only identifiers are accepted.
fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[async_trait]
impl StructuredStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn open(&self) -> StoreResult<()> {
        if !is_valid_table_name(&self.table) {
            return Err(StoreError::Unavailable(format!(
                "invalid store name: {}",
                self.table
            )));
        }

        let location = self.location.clone();
        let table = self.table.clone();
        let slot = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut guard = slot
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            if guard.is_some() {
                return Ok(());
            }

            let conn = match &location {
                Location::Memory => Connection::open_in_memory()?,
                Location::Path(path) => {
                    if let Some(parent) = path.parent() {
                        if !parent.as_os_str().is_empty() {
                            fs::create_dir_all(parent)?;
                        }
                    }
                    Connection::open(path)?
                }
            };

            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS "{table}" (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    expiry INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS "{table}_expiry" ON "{table}" (expiry);
                "#
            ))?;

            info!(table = %table, location = ?location, "Structured store opened");
            *guard = Some(conn);
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredRecord>> {
        let key = key.to_string();
        self.with_connection(move |conn, table| {
            conn.query_row(
                &format!(r#"SELECT key, value, expiry FROM "{table}" WHERE key = ?1"#),
                params![key],
                |row| {
                    Ok(StoredRecord {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        expiry: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn put(&self, record: StoredRecord) -> StoreResult<()> {
        self.with_connection(move |conn, table| {
            conn.execute(
                &format!(
                    r#"INSERT OR REPLACE INTO "{table}" (key, value, expiry) VALUES (?1, ?2, ?3)"#
                ),
                params![record.key, record.value, record.expiry],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.with_connection(move |conn, table| {
            conn.execute(
                &format!(r#"DELETE FROM "{table}" WHERE key = ?1"#),
                params![key],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete_expired(&self, now: i64) -> StoreResult<usize> {
        let removed = self
            .with_connection(move |conn, table| {
                // Range delete served by the expiry index
                conn.execute(
                    &format!(r#"DELETE FROM "{table}" WHERE expiry <= ?1"#),
                    params![now],
                )
            })
            .await?;
        debug!(removed, "Structured store expiry sweep");
        Ok(removed)
    }

    async fn clear(&self) -> StoreResult<()> {
        self.with_connection(|conn, table| {
            conn.execute(&format!(r#"DELETE FROM "{table}""#), [])
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(key: &str, value: &str, expiry: i64) -> StoredRecord {
        StoredRecord {
            key: key.to_string(),
            value: value.to_string(),
            expiry,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = SqliteStore::in_memory("cache_store");
        store.open().await.unwrap();

        store.put(record("a", "42", 1_000)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(record("a", "42", 1_000)));

        store.put(record("a", "43", 2_000)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(record("a", "43", 2_000)));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_expired_is_inclusive_range() {
        let store = SqliteStore::in_memory("cache_store");
        store.open().await.unwrap();

        store.put(record("old", "1", 100)).await.unwrap();
        store.put(record("boundary", "2", 200)).await.unwrap();
        store.put(record("live", "3", 300)).await.unwrap();

        assert_eq!(store.delete_expired(200).await.unwrap(), 2);
        assert_eq!(store.get("old").await.unwrap(), None);
        assert_eq!(store.get("boundary").await.unwrap(), None);
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = SqliteStore::in_memory("cache_store");
        store.open().await.unwrap();

        store.put(record("a", "1", 100)).await.unwrap();
        store.put(record("b", "2", 100)).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unopened_store_is_unavailable() {
        let store = SqliteStore::in_memory("cache_store");
        assert!(matches!(
            store.get("a").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_store_name_fails_to_open() {
        let store = SqliteStore::in_memory("cache\"; DROP TABLE x; --");
        assert!(matches!(store.open().await, Err(StoreError::Unavailable(_))));
        assert!(!is_valid_table_name("1cache"));
        assert!(is_valid_table_name("cache_store"));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let store = SqliteStore::at_path(&path, "cache_store");
            store.open().await.unwrap();
            store.put(record("a", "\"hello\"", i64::MAX)).await.unwrap();
        }

        let store = SqliteStore::at_path(&path, "cache_store");
        store.open().await.unwrap();
        assert_eq!(
            store.get("a").await.unwrap().map(|r| r.value),
            Some("\"hello\"".to_string())
        );
    }

    #[tokio::test]
    async fn test_separate_tables_do_not_share_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let first = SqliteStore::at_path(&path, "first");
        let second = SqliteStore::at_path(&path, "second");
        first.open().await.unwrap();
        second.open().await.unwrap();

        first.put(record("a", "1", i64::MAX)).await.unwrap();
        second.clear().await.unwrap();

        assert!(first.get("a").await.unwrap().is_some());
        assert!(second.get("a").await.unwrap().is_none());
    }
}
