mod file;
mod key;

pub use file::FileCache;
pub use key::derive_key;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// hits / (hits + misses), 0.0 before the first lookup
    pub hit_rate: f64,
    /// Sum of access counts over live entries
    pub total_accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Anything that can report cache statistics, regardless of value type.
pub trait CacheStatsSource: Send + Sync {
    fn cache_stats(&self) -> CacheStats;
}

struct CacheInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// In-memory cache with per-entry TTL and frequency-then-age eviction.
pub struct CacheManager<V> {
    inner: Mutex<CacheInner<V>>,
    max_size: usize,
    default_ttl: Duration,
}

impl<V: Clone> CacheManager<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, config.default_ttl())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        match inner.entries.get(key).map(|e| e.is_expired(now)) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.misses += 1;
                trace!(key = %key, "Cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_size {
            evict(&mut inner.entries);
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
                access_count: 1,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|e| e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    /// Drop every expired entry now instead of waiting for a lookup.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(removed = removed, "Purged expired cache entries");
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;

        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            total_accesses: inner.entries.values().map(|e| e.access_count).sum(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

/// Remove the lowest decile (at least one entry), least accessed then oldest first.
fn evict<V>(entries: &mut HashMap<String, CacheEntry<V>>) {
    if entries.is_empty() {
        return;
    }

    let to_remove = (entries.len() / 10).max(1);

    let mut ranked: Vec<(u64, Instant, String)> = entries
        .iter()
        .map(|(k, e)| (e.access_count, e.inserted_at, k.clone()))
        .collect();
    ranked.sort();

    for (_, _, key) in ranked.into_iter().take(to_remove) {
        entries.remove(&key);
    }

    debug!(evicted = to_remove, remaining = entries.len(), "Cache eviction pass");
}

impl<V: Clone + Send> CacheStatsSource for CacheManager<V> {
    fn cache_stats(&self) -> CacheStats {
        self.stats()
    }
}
