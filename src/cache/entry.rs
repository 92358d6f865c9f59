//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support and
//! the record shape written to the persistent key-value tier.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// Represents a single cache entry with value and absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// The cache key
    pub key: String,
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expiry_timestamp: i64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry that expires `ttl` from now.
    pub fn new(key: impl Into<String>, value: V, ttl: Duration) -> Self {
        Self::with_expiry(key, value, expiry_from_now(ttl))
    }

    /// Creates an entry with an explicit expiry, e.g. when promoting from a slower tier.
    pub fn with_expiry(key: impl Into<String>, value: V, expiry_timestamp: i64) -> Self {
        Self {
            key: key.into(),
            value,
            expiry_timestamp,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is valid only while `now < expiry_timestamp`; at the
    /// boundary it is already expired.
    pub fn is_expired(&self) -> bool {
        is_expired_at(self.expiry_timestamp, current_timestamp_ms())
    }

    /// Converts into the record written to the persistent key-value tier.
    pub fn to_record(&self) -> PersistedRecord<&V> {
        PersistedRecord {
            value: &self.value,
            expiry_timestamp: self.expiry_timestamp,
        }
    }
}

// == Persisted Record ==
/// Serialized form in the persistent key-value tier: `{ value, expiryTimestamp }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedRecord<V> {
    pub value: V,
    #[serde(rename = "expiryTimestamp")]
    pub expiry_timestamp: i64,
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry for a TTL starting now, saturating instead of overflowing.
pub fn expiry_from_now(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    current_timestamp_ms().saturating_add(ttl_ms)
}

/// Shared expiry rule for every tier.
pub fn is_expired_at(expiry_timestamp: i64, now: i64) -> bool {
    now >= expiry_timestamp
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new("a", "test_value".to_string(), Duration::from_secs(60));

        assert_eq!(entry.key, "a");
        assert_eq!(entry.value, "test_value");
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("a", 42, Duration::from_millis(100));

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(150));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiry_is_ttl_from_now() {
        let before = current_timestamp_ms();
        let entry = CacheEntry::new("a", 1, Duration::from_secs(10));

        assert!(entry.expiry_timestamp >= before + 10_000);
        assert!(entry.expiry_timestamp <= current_timestamp_ms() + 10_000);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry::with_expiry("a", "test", now);

        assert!(entry.is_expired(), "Entry should be expired at boundary");
        assert!(is_expired_at(now, now));
        assert!(!is_expired_at(now + 1, now));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("a", 1, Duration::MAX);
        assert_eq!(entry.expiry_timestamp, i64::MAX);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_record_uses_camel_case_expiry() {
        let entry = CacheEntry::with_expiry("a", 42, 1_700_000_000_000);
        let json = serde_json::to_string(&entry.to_record()).unwrap();
        assert_eq!(json, r#"{"value":42,"expiryTimestamp":1700000000000}"#);

        let parsed: PersistedRecord<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.value, 42);
        assert_eq!(parsed.expiry_timestamp, 1_700_000_000_000);
    }
}
