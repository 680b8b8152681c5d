//! In-memory image cache with per-key deferred eviction.
//!
//! Entries are raw encoded bytes. Reading an entry counts as renewed interest
//! and cancels any eviction scheduled for it; releasing interest is expressed
//! by [`MemoryCache::schedule_evict`], which arms a single timer per key.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{
    error::{CacheError, Result},
    metrics::{CacheMetrics, CacheStats},
};

/// Capacity bound for the memory cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum total size in bytes
    pub max_bytes: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl MemoryCacheConfig {
    /// Create a config with both limits
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    /// Set the byte limit in megabytes
    pub fn with_max_mb(mut self, max_mb: u64) -> Self {
        self.max_bytes = max_mb * 1024 * 1024;
        self
    }
}

struct Entry {
    bytes: Bytes,
    last_access: u64,
}

struct PendingEviction {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    timers: HashMap<String, PendingEviction>,
    size_bytes: u64,
    clock: u64,
    next_generation: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove_entry(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.size_bytes -= entry.bytes.len() as u64;
        Some(entry)
    }

    fn cancel_timer(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Least recently accessed key, ignoring `protected`.
    fn coldest_key(&self, protected: &str) -> Option<String> {
        self.entries
            .iter()
            .filter(|(key, _)| key.as_str() != protected)
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone())
    }
}

impl Drop for State {
    fn drop(&mut self) {
        for pending in self.timers.values() {
            pending.handle.abort();
        }
    }
}

/// Bounded key → bytes store with cancellable eviction timers.
///
/// All operations take one short-lived lock and never hold it across an
/// await point. Timers are tokio tasks holding a weak reference to the state
/// and the generation they were armed with; a timer only evicts if it is
/// still the current one for its key when it fires.
pub struct MemoryCache {
    state: Arc<Mutex<State>>,
    config: MemoryCacheConfig,
    metrics: CacheMetrics,
}

impl MemoryCache {
    /// Create a cache with the default capacity bound
    pub fn new() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }

    /// Create a cache with a custom capacity bound
    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            config,
            metrics: CacheMetrics::new(),
        }
    }

    /// Get the capacity configuration
    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Store bytes under `key`, replacing any previous entry.
    ///
    /// Storing counts as renewed interest, so a pending eviction for the key
    /// is cancelled. Colder entries are dropped until the cache is back
    /// within its capacity bound.
    pub fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let size = bytes.len() as u64;
        let mut state = self.state.lock();

        state.cancel_timer(key);
        state.remove_entry(key);

        if size > self.config.max_bytes {
            self.metrics
                .set_occupancy(state.entries.len(), state.size_bytes);
            return Err(CacheError::CapacityExceeded {
                size_bytes: size,
                max_bytes: self.config.max_bytes,
            });
        }

        let last_access = state.tick();
        state.entries.insert(key.to_string(), Entry { bytes, last_access });
        state.size_bytes += size;
        self.metrics.record_insert();

        while state.entries.len() > self.config.max_entries
            || state.size_bytes > self.config.max_bytes
        {
            let Some(victim) = state.coldest_key(key) else {
                break;
            };
            state.cancel_timer(&victim);
            state.remove_entry(&victim);
            self.metrics.record_capacity_drop();
            debug!(key = %victim, "Dropped memory cache entry over capacity");
        }

        self.metrics
            .set_occupancy(state.entries.len(), state.size_bytes);
        trace!(key, size, "Stored memory cache entry");
        Ok(())
    }

    /// Look up `key`, cancelling any pending eviction for it.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();

        if state.cancel_timer(key) {
            debug!(key, "Cancelled pending eviction on access");
        }

        let now = state.tick();
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                self.metrics.record_hit();
                Some(entry.bytes.clone())
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Check for `key` without touching it or its timer.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Arm the eviction timer for `key`, replacing any earlier one.
    ///
    /// Returns `false` if the key is not cached or no tokio runtime is
    /// available to run the timer.
    pub fn schedule_evict(&self, key: &str, delay: Duration) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(key, "Cannot schedule eviction outside a tokio runtime");
                return false;
            }
        };

        let mut state = self.state.lock();
        if !state.entries.contains_key(key) {
            return false;
        }

        state.cancel_timer(key);
        state.next_generation += 1;
        let generation = state.next_generation;

        let weak: Weak<Mutex<State>> = Arc::downgrade(&self.state);
        let metrics = self.metrics.clone();
        let timer_key = key.to_string();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.lock();
            let current = state
                .timers
                .get(&timer_key)
                .is_some_and(|pending| pending.generation == generation);
            if !current {
                return;
            }
            state.timers.remove(&timer_key);
            if state.remove_entry(&timer_key).is_some() {
                metrics.record_timed_eviction();
                metrics.set_occupancy(state.entries.len(), state.size_bytes);
                debug!(key = %timer_key, "Evicted memory cache entry");
            }
        });

        state
            .timers
            .insert(key.to_string(), PendingEviction { generation, handle });
        debug!(key, ?delay, "Scheduled memory cache eviction");
        true
    }

    /// Cancel the pending eviction for `key`, if any
    pub fn cancel_evict(&self, key: &str) -> bool {
        self.state.lock().cancel_timer(key)
    }

    /// Whether an eviction timer is armed for `key`
    pub fn has_pending_eviction(&self, key: &str) -> bool {
        self.state.lock().timers.contains_key(key)
    }

    /// Remove `key` and its timer immediately
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.cancel_timer(key);
        let removed = state.remove_entry(key).is_some();
        self.metrics
            .set_occupancy(state.entries.len(), state.size_bytes);
        removed
    }

    /// Remove every entry and cancel every timer
    pub fn clear(&self) {
        let mut state = self.state.lock();
        for (_, pending) in state.timers.drain() {
            pending.handle.abort();
        }
        state.entries.clear();
        state.size_bytes = 0;
        self.metrics.set_occupancy(0, 0);
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of cached bytes
    pub fn size_bytes(&self) -> u64 {
        self.state.lock().size_bytes
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// Get the metrics tracker
    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}
