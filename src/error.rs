//! Error types for the tiered cache
//!
//! Storage failures are typed with [`StoreError`] and absorbed inside the
//! cache. The only error a public cache operation returns is
//! [`CacheError::ProducerFailure`].

use thiserror::Error;

// == Store Error Enum ==
/// Failure reported by one of the backing stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Write rejected because it would exceed the store's size quota
    #[error("Quota exceeded for {key}: {size} exceeds limit of {limit}")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    /// Store is disabled, not supported, or failed to open
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored record could not be parsed
    #[error("Corrupt record for {key}: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized for storage
    #[error("Serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Filesystem error from a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the embedded SQLite store
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True when a write should be rerouted to the next tier instead of dropped.
    pub fn is_redirectable(&self) -> bool {
        matches!(
            self,
            StoreError::QuotaExceeded { .. } | StoreError::Unavailable(_) | StoreError::Io(_)
        )
    }
}

/// Result type for backing store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Cache Error Enum ==
/// Error returned from public cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The caller-supplied value producer in `get_or_set` failed
    #[error("Value producer failed: {0:#}")]
    ProducerFailure(anyhow::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_is_redirectable() {
        let err = StoreError::QuotaExceeded {
            key: "cache_a".to_string(),
            size: 10,
            limit: 5,
        };
        assert!(err.is_redirectable());
        assert!(err.to_string().contains("cache_a"));
    }

    #[test]
    fn test_corrupt_record_is_not_redirectable() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::CorruptRecord {
            key: "cache_a".to_string(),
            source,
        };
        assert!(!err.is_redirectable());
    }

    #[test]
    fn test_producer_failure_message() {
        let err = CacheError::ProducerFailure(anyhow::anyhow!("backend down"));
        assert_eq!(err.to_string(), "Value producer failed: backend down");
    }
}
