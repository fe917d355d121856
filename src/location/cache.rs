//! TTL-bounded resolution cache, optionally persisted at ~/.geoplace/cache.json.
//!
//! Keys are canonical names. Negative entries (`coordinate: None`) are
//! cached like hits so known-unresolvable names are not re-queried.
//! Staleness is decided against an explicit `now`, never the wall clock.

use super::types::{CanonicalName, Coordinate, ResolutionEntry};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Cache-wide freshness policy, fixed when the cache is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    pub ttl: Duration,
    /// Shorter window for negative entries; `None` uses `ttl`.
    pub negative_ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, negative_ttl: None }
    }

    pub fn with_negative_ttl(mut self, negative_ttl: Duration) -> Self {
        self.negative_ttl = Some(negative_ttl);
        self
    }

    fn ttl_for(&self, entry: &ResolutionEntry) -> Duration {
        if entry.is_negative() {
            self.negative_ttl.unwrap_or(self.ttl)
        } else {
            self.ttl
        }
    }

    fn is_fresh(&self, entry: &ResolutionEntry, now: DateTime<Utc>) -> bool {
        now - entry.resolved_at <= self.ttl_for(entry)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counts over the current contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub stale: usize,
    pub negative: usize,
}

/// The shared resolution cache. All access goes through one `RwLock`, so
/// each key's transition is atomic.
pub struct ResolutionCache {
    path: Option<PathBuf>,
    policy: CachePolicy,
    entries: RwLock<HashMap<CanonicalName, ResolutionEntry>>,
}

impl ResolutionCache {
    /// A process-lifetime cache with no backing file.
    pub fn in_memory(policy: CachePolicy) -> Self {
        Self {
            path: None,
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load from `path`, dropping entries already stale at `now`.
    /// A missing or unreadable file yields an empty cache.
    pub fn open(path: PathBuf, policy: CachePolicy, now: DateTime<Utc>) -> Self {
        let mut entries = Self::read_file(&path).unwrap_or_default();
        let loaded = entries.len();
        entries.retain(|_, entry| policy.is_fresh(entry, now));
        debug!(
            path = %path.display(),
            loaded,
            kept = entries.len(),
            "opened resolution cache"
        );
        Self {
            path: Some(path),
            policy,
            entries: RwLock::new(entries),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geoplace")
            .join("cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<CanonicalName, ResolutionEntry>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                None
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The entry for `key` if it is still fresh at `now`.
    pub fn get(&self, key: &CanonicalName, now: DateTime<Utc>) -> Option<ResolutionEntry> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| self.policy.is_fresh(entry, now))
            .cloned()
    }

    /// The entry for `key` regardless of age. Diagnostics only.
    pub fn peek(&self, key: &CanonicalName) -> Option<ResolutionEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or overwrite. Last write wins.
    pub fn put(&self, key: &CanonicalName, coordinate: Option<Coordinate>, now: DateTime<Utc>) {
        let entry = ResolutionEntry {
            name: key.clone(),
            coordinate,
            resolved_at: now,
        };
        self.entries.write().insert(key.clone(), entry);
    }

    /// Write the whole map to the backing file, if there is one.
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = {
            let entries = self.entries.read();
            serde_json::to_string_pretty(&*entries)?
        };
        fs::write(path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })
    }

    pub fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let entries = self.entries.read();
        let fresh = entries
            .values()
            .filter(|e| self.policy.is_fresh(e, now))
            .count();
        CacheStats {
            total: entries.len(),
            fresh,
            stale: entries.len() - fresh,
            negative: entries.values().filter(|e| e.is_negative()).count(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::normalize::normalize;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn policy() -> CachePolicy {
        CachePolicy::new(Duration::hours(24))
    }

    #[test]
    fn test_put_get_within_ttl() {
        let cache = ResolutionCache::in_memory(policy());
        let key = normalize("Hosur");
        let coord = Coordinate::new(12.7409, 77.8253);
        cache.put(&key, Some(coord), t0());

        let entry = cache.get(&key, t0()).unwrap();
        assert_eq!(entry.name, key);
        assert_eq!(entry.resolved_at, t0());
        let got = entry.coordinate.unwrap();
        assert_relative_eq!(got.lat, 12.7409);
        assert_relative_eq!(got.lon, 77.8253);

        assert!(cache.get(&key, t0() + Duration::hours(24)).is_some());
    }

    #[test]
    fn test_expired_after_ttl() {
        let cache = ResolutionCache::in_memory(policy());
        let key = normalize("Hosur");
        cache.put(&key, Some(Coordinate::new(12.74, 77.82)), t0());

        let later = t0() + Duration::hours(24) + Duration::seconds(1);
        assert!(cache.get(&key, later).is_none());
        // Still readable for diagnostics.
        assert!(cache.peek(&key).is_some());
    }

    #[test]
    fn test_miss() {
        let cache = ResolutionCache::in_memory(policy());
        assert!(cache.get(&normalize("Nowhere"), t0()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_negative_entry_is_a_hit() {
        let cache = ResolutionCache::in_memory(policy());
        let key = normalize("Xyzpur");
        cache.put(&key, None, t0());

        let entry = cache.get(&key, t0() + Duration::minutes(5)).unwrap();
        assert!(entry.is_negative());
    }

    #[test]
    fn test_shorter_negative_ttl() {
        let cache = ResolutionCache::in_memory(policy().with_negative_ttl(Duration::hours(1)));
        let miss = normalize("Xyzpur");
        let hit = normalize("Pune");
        cache.put(&miss, None, t0());
        cache.put(&hit, Some(Coordinate::new(18.52, 73.85)), t0());

        let later = t0() + Duration::hours(2);
        assert!(cache.get(&miss, later).is_none());
        assert!(cache.get(&hit, later).is_some());
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ResolutionCache::in_memory(policy());
        let key = normalize("Pune");
        cache.put(&key, None, t0());
        cache.put(&key, Some(Coordinate::new(18.52, 73.85)), t0() + Duration::minutes(1));

        let entry = cache.get(&key, t0() + Duration::minutes(2)).unwrap();
        assert!(entry.coordinate.is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats() {
        let cache = ResolutionCache::in_memory(policy());
        cache.put(&normalize("A"), None, t0());
        cache.put(&normalize("B"), Some(Coordinate::new(1.0, 1.0)), t0() - Duration::days(2));
        cache.put(&normalize("C"), Some(Coordinate::new(2.0, 2.0)), t0());

        let stats = cache.stats(t0());
        assert_eq!(stats, CacheStats { total: 3, fresh: 2, stale: 1, negative: 1 });
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        {
            let cache = ResolutionCache::open(path.clone(), policy(), t0());
            cache.put(&normalize("Delhi"), Some(Coordinate::new(28.6139, 77.209)), t0());
            cache.put(&normalize("Xyzpur"), None, t0());
            cache.persist().unwrap();
        }

        let cache = ResolutionCache::open(path, policy(), t0() + Duration::hours(1));
        assert_eq!(cache.len(), 2);
        let delhi = cache.get(&normalize("delhi"), t0() + Duration::hours(1)).unwrap();
        assert_relative_eq!(delhi.coordinate.unwrap().lat, 28.6139);
        assert!(cache.get(&normalize("Xyzpur"), t0()).unwrap().is_negative());
    }

    #[test]
    fn test_stale_entries_dropped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ResolutionCache::open(path.clone(), policy(), t0());
        cache.put(&normalize("Old"), Some(Coordinate::new(1.0, 1.0)), t0() - Duration::days(3));
        cache.put(&normalize("New"), Some(Coordinate::new(2.0, 2.0)), t0());
        cache.persist().unwrap();

        let reloaded = ResolutionCache::open(path, policy(), t0());
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.peek(&normalize("Old")).is_none());
    }

    #[test]
    fn test_corrupt_file_yields_empty_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = ResolutionCache::open(path, policy(), t0());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_in_memory_persist_is_noop() {
        let cache = ResolutionCache::in_memory(policy());
        cache.put(&normalize("Pune"), None, t0());
        assert!(cache.persist().is_ok());
        assert!(cache.path().is_none());
    }

    #[test]
    fn test_concurrent_writers() {
        let cache = Arc::new(ResolutionCache::in_memory(policy()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let key = normalize(&format!("Place {}", j % 10));
                        cache.put(&key, Some(Coordinate::new(i as f64, j as f64)), t0());
                        assert!(cache.get(&key, t0()).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
    }
}
