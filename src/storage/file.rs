//! Directory-backed key-value store.
//!
//! Each key is one file whose name is the hex-encoded key, so arbitrary
//! cache keys map to safe file names.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::storage::KeyValueStore;

/// Persistent [`KeyValueStore`] writing one file per key under a directory.
///
/// Writes go to a staging file that is renamed over the key's file, so a
/// failed write leaves the previous contents and the usage count intact.
/// The quota bounds the total bytes of all files in the directory.
#[derive(Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
    quota: u64,
    /// Bytes currently on disk
    usage: Mutex<u64>,
}

impl FileKeyValueStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// Existing files are counted toward the quota.
    pub fn open(dir: impl Into<PathBuf>, quota: u64) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut usage = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                usage += entry.metadata()?.len();
            }
        }

        info!(dir = ?dir, usage, quota, "File key-value store opened");
        Ok(Self {
            dir,
            quota,
            usage: Mutex::new(usage),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(key.as_bytes()))
    }

    /// Temporary file a write lands in before it replaces the key's file.
    /// The leading dot keeps it out of `keys()`.
    fn staging_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.tmp", hex::encode(key.as_bytes())))
    }

    fn existing_size(path: &Path) -> StoreResult<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_usage(&self) -> StoreResult<std::sync::MutexGuard<'_, u64>> {
        self.usage
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".to_string()))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        "file-kv"
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let mut usage = self.lock_usage()?;

        let old_size = Self::existing_size(&path)?;
        let new_size = value.len() as u64;
        let projected = *usage - old_size.min(*usage) + new_size;
        if projected > self.quota {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                size: usize::try_from(projected).unwrap_or(usize::MAX),
                limit: usize::try_from(self.quota).unwrap_or(usize::MAX),
            });
        }

        let staging = self.staging_path_for(key);
        if let Err(e) = fs::write(&staging, value).and_then(|()| fs::rename(&staging, &path)) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                debug!(key = %key, error = %cleanup, "Staging file not removed");
            }
            return Err(e.into());
        }
        *usage = projected;
        debug!(key = %key, bytes = new_size, "File store write");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let mut usage = self.lock_usage()?;

        let size = Self::existing_size(&path)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                *usage = usage.saturating_sub(size);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            // Foreign files that are not hex-encoded keys are ignored
            let decoded = name
                .to_str()
                .and_then(|n| hex::decode(n).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(key) = decoded {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
