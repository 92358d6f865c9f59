//! Configuration Module
//!
//! Handles loading cache policy settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MEMORY_CAPACITY, DEFAULT_PREFIX, DEFAULT_STORE_NAME,
    DEFAULT_TTL_MS, MAX_PERSISTENT_ITEM_SIZE,
};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the memory tier can hold
    pub memory_capacity: usize,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// Background cleanup interval in seconds (0 disables the sweep)
    pub cleanup_interval: u64,
    /// Largest serialized record (in characters) written to the persistent tier
    pub max_item_size: usize,
    /// Namespace prefix for keys in the persistent key-value tier (see [`Config::namespace`])
    pub prefix: String,
    /// Name of the dedicated table in the structured tier
    pub store_name: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MEMORY_CAPACITY` - Memory tier capacity (default: 100)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_MAX_ITEM_SIZE` - Persistent tier item limit (default: 5000000)
    /// - `CACHE_PREFIX` - Persistent tier key prefix (default: "cache")
    /// - `CACHE_STORE_NAME` - Structured tier table name (default: "cache_store")
    pub fn from_env() -> Self {
        Self {
            memory_capacity: parse_var("CACHE_MEMORY_CAPACITY", DEFAULT_MEMORY_CAPACITY),
            default_ttl_ms: parse_var("CACHE_DEFAULT_TTL_MS", DEFAULT_TTL_MS),
            cleanup_interval: parse_var("CACHE_CLEANUP_INTERVAL", DEFAULT_CLEANUP_INTERVAL_SECS),
            max_item_size: parse_var("CACHE_MAX_ITEM_SIZE", MAX_PERSISTENT_ITEM_SIZE),
            prefix: env::var("CACHE_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
            store_name: env::var("CACHE_STORE_NAME")
                .unwrap_or_else(|_| DEFAULT_STORE_NAME.to_string()),
        }
    }

    /// Default TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Namespace used for persistent-tier keys, `<namespace>_<key>`.
    ///
    /// Underscores in `prefix` become `-` so the `_` separator is unique and
    /// no cache's namespace can contain another's.
    pub fn namespace(&self) -> String {
        self.prefix.replace('_', "-")
    }

    /// Sweep interval, or None when the periodic sweep is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval > 0).then(|| Duration::from_secs(self.cleanup_interval))
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl_ms: DEFAULT_TTL_MS,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL_SECS,
            max_item_size: MAX_PERSISTENT_ITEM_SIZE,
            prefix: DEFAULT_PREFIX.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
        }
    }
}
