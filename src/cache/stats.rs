//! Cache Statistics Module
//!
//! Tracks hits, misses, writes and cleanup activity of an engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a live value
    pub hits: u64,
    /// Reads of absent or expired keys
    pub misses: u64,
    /// Successful writes
    pub sets: u64,
    /// Removals that deleted a row
    pub removals: u64,
    /// Refreshes that moved an expiry and were written
    pub refreshes: u64,
    /// Refreshes skipped because the expiry did not move
    pub skipped_refreshes: u64,
    /// Completed cleanup sweeps
    pub sweeps: u64,
    /// Rows deleted by cleanup sweeps
    pub swept_entries: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Shared, lock-free counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    removals: AtomicU64,
    refreshes: AtomicU64,
    skipped_refreshes: AtomicU64,
    sweeps: AtomicU64,
    swept_entries: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh(&self, written: bool) {
        if written {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.skipped_refreshes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_sweep(&self, removed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.swept_entries.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            skipped_refreshes: self.skipped_refreshes.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            swept_entries: self.swept_entries.load(Ordering::Relaxed),
        }
    }
}
