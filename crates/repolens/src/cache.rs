//! TTL-based response memoization.
//!
//! Four query shapes plus the single-repository lookups are cached in
//! independent tables. Lookup is a plain key match; an entry is valid only
//! while its age is under the TTL, expired entries are treated as misses but
//! not proactively deleted (lazy invalidation), and writes always overwrite.
//! There is no size bound; [`TtlCache::purge_expired`] is the hook for hosts
//! that want to sweep on their own schedule.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::github::{ProcessedRepository, RawRepositorySummary};

/// Validity window for every cache table.
pub fn default_ttl() -> Duration {
    Duration::minutes(15)
}

/// A cached value with its capture timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// An entry is valid iff `now - cached_at < ttl`.
    #[inline]
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at < ttl
    }
}

/// A single-keyed TTL cache table.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Look up a key; expired entries count as misses.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().expect("cache lock should not be poisoned");
        let entry = entries.get(key)?;
        if entry.is_valid(self.clock.now(), self.ttl) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Insert or overwrite; partial results are never merged into old values.
    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().expect("cache lock should not be poisoned");
        entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: self.clock.now(),
            },
        );
    }

    /// Drop every expired entry. Never called implicitly.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock should not be poisoned");
        entries.retain(|_, e| e.is_valid(now, self.ttl));
    }

    /// Number of stored entries, valid or expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .expect("cache lock should not be poisoned")
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The five independently keyed tables of the API layer.
///
/// Keys incorporate every dimension that affects the result: page number and
/// normalized filter signature for popular, page for trending, the
/// lower-cased literal query text for search, and id / full name for single
/// repositories.
pub struct ResponseCache {
    pub popular: TtlCache<(u32, String), Vec<RawRepositorySummary>>,
    pub trending: TtlCache<u32, Vec<RawRepositorySummary>>,
    pub search: TtlCache<String, Vec<RawRepositorySummary>>,
    pub by_id: TtlCache<u64, ProcessedRepository>,
    pub by_full_name: TtlCache<String, ProcessedRepository>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            popular: TtlCache::new(ttl, clock.clone()),
            trending: TtlCache::new(ttl, clock.clone()),
            search: TtlCache::new(ttl, clock.clone()),
            by_id: TtlCache::new(ttl, clock.clone()),
            by_full_name: TtlCache::new(ttl, clock),
        }
    }

    /// Case-insensitive key for the search table.
    #[must_use]
    pub fn search_key(query: &str) -> String {
        query.to_lowercase()
    }

    /// Key for the full-name table; GitHub full names are case-insensitive.
    #[must_use]
    pub fn full_name_key(owner: &str, name: &str) -> String {
        format!("{}/{}", owner.to_lowercase(), name.to_lowercase())
    }
}
