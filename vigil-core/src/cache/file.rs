use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ensure_cache_dir;
use crate::error::VigilResult;

#[derive(Debug, Serialize, Deserialize)]
struct FileCacheRecord {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

/// Persistent cache of JSON-serializable values, one file per key.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> VigilResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Cache under the platform cache directory.
    pub fn in_default_location() -> VigilResult<Self> {
        Ok(Self {
            dir: ensure_cache_dir()?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.cache", safe))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let raw = std::fs::read(&path).ok()?;

        let record: FileCacheRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Discarding unreadable cache file");
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        if record.expires_at.is_some_and(|at| at < Utc::now()) {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        serde_json::from_value(record.value).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "Value is not serializable, skipping file cache");
                return;
            }
        };

        let now = Utc::now();
        // TTLs past the representable date range never expire
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));
        if ttl.is_some() && expires_at.is_none() {
            debug!(key = %key, "TTL out of range, storing without expiry");
        }

        let record = FileCacheRecord {
            value,
            stored_at: now,
            expires_at,
        };

        let path = self.path_for(key);
        let result = serde_json::to_vec(&record)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&path, bytes));

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write file cache entry");
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        std::fs::remove_file(self.path_for(key)).is_ok()
    }

    pub fn clear(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "cache"))
            .filter(|path| std::fs::remove_file(path).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip_without_ttl() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();

        cache.set("project-summary", &vec!["src/main.rs", "Cargo.toml"], None);
        let value: Option<Vec<String>> = cache.get("project-summary");

        assert_eq!(
            value,
            Some(vec!["src/main.rs".to_string(), "Cargo.toml".to_string()])
        );
    }

    #[test]
    fn test_expired_entry_is_deleted() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();

        cache.set("brief", &1u32, Some(Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get::<u32>("brief"), None);
        assert!(!dir.path().join("brief.cache").exists());
    }

    #[test]
    fn test_out_of_range_ttl_never_expires() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        let four_hundred_millennia = Duration::from_secs(400_000 * 365 * 24 * 3600);

        cache.set("forever", &1u32, Some(four_hundred_millennia));
        cache.set("max", &2u32, Some(Duration::MAX));

        assert_eq!(cache.get::<u32>("forever"), Some(1));
        assert_eq!(cache.get::<u32>("max"), Some(2));
    }

    #[test]
    fn test_corrupt_file_is_discarded() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.cache"), b"not json").unwrap();

        assert_eq!(cache.get::<u32>("broken"), None);
        assert!(!dir.path().join("broken.cache").exists());
    }

    #[test]
    fn test_keys_are_sanitized_and_clear_removes_all() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();

        cache.set("../escape/attempt", &"x", None);
        cache.set("plain", &"y", None);
        std::fs::write(dir.path().join("keep.txt"), b"other").unwrap();

        assert_eq!(cache.get::<String>("../escape/attempt"), Some("x".to_string()));
        assert_eq!(cache.clear(), 2);
        assert!(dir.path().join("keep.txt").exists());
    }
}
