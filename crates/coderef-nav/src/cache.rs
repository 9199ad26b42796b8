//! Response cache with time-based expiry, backed by `moka`.

use crate::query::QueryResponse;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::fmt;
use std::time::Duration;

/// Query responses keyed by the canonical JSON of the normalized request.
///
/// Entries expire `ttl` after insertion. Past `max_entries`, expired entries
/// go first, then the least recently used.
pub struct ResponseCache {
    cache: Cache<String, QueryResponse>,
    ttl: Duration,
    max_entries: u64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let max_entries = max_entries as u64;
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            cache,
            ttl,
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries as usize
    }

    /// A live response for `key`. Expired entries are never returned.
    pub fn get(&self, key: &str) -> Option<QueryResponse> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, response: QueryResponse) {
        if self.max_entries == 0 {
            return;
        }
        self.cache.insert(key, response);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Live entries, after expired and evicted ones are flushed.
    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
