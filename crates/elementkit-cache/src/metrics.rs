//! Cache performance monitoring and metrics

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

/// Memory cache statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries stored (including overwrites)
    pub insertions: u64,
    /// Entries removed by an eviction timer firing
    pub timed_evictions: u64,
    /// Entries dropped to stay within the capacity bound
    pub capacity_drops: u64,
    /// Current cache size in bytes
    pub size_bytes: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Timestamp of cache creation
    pub created_at: SystemTime,
}

impl CacheStats {
    /// Calculate hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage (0.0 to 100.0)
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Total entries removed for any reason other than explicit removal
    pub fn total_evictions(&self) -> u64 {
        self.timed_evictions + self.capacity_drops
    }

    /// Get uptime since cache creation
    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Thread-safe cache metrics tracker
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    insertions: Arc<AtomicU64>,
    timed_evictions: Arc<AtomicU64>,
    capacity_drops: Arc<AtomicU64>,
    size_bytes: Arc<AtomicU64>,
    entry_count: Arc<AtomicU64>,
    created_at: SystemTime,
}

impl CacheMetrics {
    /// Create new cache metrics
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            insertions: Arc::new(AtomicU64::new(0)),
            timed_evictions: Arc::new(AtomicU64::new(0)),
            capacity_drops: Arc::new(AtomicU64::new(0)),
            size_bytes: Arc::new(AtomicU64::new(0)),
            entry_count: Arc::new(AtomicU64::new(0)),
            created_at: SystemTime::now(),
        }
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a store operation
    pub fn record_insert(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry removed by its eviction timer
    pub fn record_timed_eviction(&self) {
        self.timed_evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry dropped under capacity pressure
    pub fn record_capacity_drop(&self) {
        self.capacity_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Update current occupancy
    pub fn set_occupancy(&self, entry_count: usize, size_bytes: u64) {
        self.entry_count.store(entry_count as u64, Ordering::Relaxed);
        self.size_bytes.store(size_bytes, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            timed_evictions: self.timed_evictions.load(Ordering::Relaxed),
            capacity_drops: self.capacity_drops.load(Ordering::Relaxed),
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
            entry_count: self.entry_count.load(Ordering::Relaxed) as usize,
            created_at: self.created_at,
        }
    }

    /// Reset all counters (occupancy is left untouched)
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.insertions.store(0, Ordering::Relaxed);
        self.timed_evictions.store(0, Ordering::Relaxed);
        self.capacity_drops.store(0, Ordering::Relaxed);
    }

    /// Get a formatted summary of cache metrics
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Image Cache Metrics:\n  Hits: {}\n  Misses: {}\n  Hit Rate: {:.2}%\n  Insertions: {}\n  Timed Evictions: {}\n  Capacity Drops: {}\n  Entries: {}\n  Size: {} bytes",
            stats.hits,
            stats.misses,
            stats.hit_rate(),
            stats.insertions,
            stats.timed_evictions,
            stats.capacity_drops,
            stats.entry_count,
            stats.size_bytes,
        )
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
