// Shared TTL cache of resolved process metadata

use crate::process::ProcessMetadata;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// How long a resolved record stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Cache key for a (name, pid) pair
///
/// Name and pid are concatenated with no separator, so "app1" + 23 and
/// "app12" + 3 share a key.
pub fn cache_key(name: &str, pid: i32) -> String {
    format!("{}{}", name, pid)
}

struct CacheEntry {
    record: ProcessMetadata,
    stored_at: Instant,
}

/// Process-wide metadata store
///
/// All access goes through one mutex and records are only ever inserted
/// whole, so readers never see a half-written entry. A concurrent
/// `clear_all` and insert may land in either order.
pub struct MetadataCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic elsewhere while holding the lock cannot leave a partial
        // record behind, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }

    /// Fresh record for (name, pid), if any
    pub fn get(&self, name: &str, pid: i32) -> Option<ProcessMetadata> {
        let entries = self.lock();
        entries
            .get(&cache_key(name, pid))
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.record.clone())
    }

    /// Store `record` unless a fresh one is already present
    ///
    /// Returns whichever record is in the cache afterwards.
    pub fn put_if_absent_or_stale(
        &self,
        name: &str,
        pid: i32,
        record: ProcessMetadata,
    ) -> ProcessMetadata {
        let mut entries = self.lock();
        let key = cache_key(name, pid);

        if let Some(existing) = entries.get(&key).filter(|entry| self.is_fresh(entry)) {
            return existing.record.clone();
        }

        entries.insert(
            key,
            CacheEntry {
                record: record.clone(),
                stored_at: Instant::now(),
            },
        );
        record
    }

    /// Drop every entry regardless of age
    pub fn clear_all(&self) {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        log::debug!("Metadata cache cleared ({} entries)", count);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
