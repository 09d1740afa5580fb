//! Point-in-time diagnostics for a document session.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::sync::SyncStats;

/// Snapshot of a session's runtime health, for display and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub fps: f64,
    pub frames: u64,

    pub cache_hit_rate: f64,
    pub cache_entries: usize,
    pub cache_bytes: usize,
    pub cache_budget_bytes: usize,
    pub cache_evictions: u64,
    pub cache_disabled: bool,

    pub loaded_chunks: u64,
    pub pending_loads: usize,
    pub chunk_loads: u64,
    pub unavailable_chunks: u64,

    pub propagated_updates: u64,
    pub dropped_echoes: u64,

    pub state_revision: u64,
}

impl Diagnostics {
    /// Fill the cache fields from cache statistics.
    pub fn with_cache(mut self, stats: &CacheStats) -> Self {
        self.cache_hit_rate = stats.hit_rate();
        self.cache_entries = stats.entry_count;
        self.cache_bytes = stats.total_bytes;
        self.cache_budget_bytes = stats.budget_bytes;
        self.cache_evictions = stats.evictions;
        self.cache_disabled = stats.disabled;
        self
    }

    /// Add one synchronizer's counters.
    pub fn add_sync(mut self, stats: &SyncStats) -> Self {
        self.propagated_updates += stats.propagated;
        self.dropped_echoes += stats.dropped_echoes;
        self
    }

    /// Cache usage as "12.3 MB / 100.0 MB".
    pub fn cache_usage_human(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.cache_bytes),
            format_bytes(self.cache_budget_bytes)
        )
    }
}

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes >= KIB * KIB * KIB {
        format!("{:.1} GiB", bytes / (KIB * KIB * KIB))
    } else if bytes >= KIB * KIB {
        format!("{:.1} MiB", bytes / (KIB * KIB))
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{} B", bytes)
    }
}
