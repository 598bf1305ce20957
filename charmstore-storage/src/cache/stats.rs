//! Cache usage statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about one entity cache's lifetime so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a resolved entry.
    pub hits: u64,
    /// Lookups that waited on another caller's in-flight fetch.
    pub waits: u64,
    /// Lookups that had to start a fetch.
    pub misses: u64,
    /// Store round trips issued, single and batched.
    pub store_calls: u64,
    /// Hits that replayed a cached failure.
    pub failures_replayed: u64,
    /// Number of entries currently held, both document kinds.
    pub entry_count: u64,
}

impl CacheStats {
    /// Fraction of lookups that did not start a fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.waits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    waits: AtomicU64,
    misses: AtomicU64,
    store_calls: AtomicU64,
    failures_replayed: AtomicU64,
}

impl Counters {
    pub(crate) fn hit(&self, failed: bool) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures_replayed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn store_call(&self) {
        self.store_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            store_calls: self.store_calls.load(Ordering::Relaxed),
            failures_replayed: self.failures_replayed.load(Ordering::Relaxed),
            entry_count,
        }
    }
}
