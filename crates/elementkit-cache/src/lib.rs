//! # elementkit cache
//!
//! Two-level byte caching for the elementkit image loader.
//!
//! ## Features
//!
//! - **Memory cache**: bounded key → bytes store with per-key eviction timers
//!   that are cancelled whenever the entry is read again
//! - **Disk cache**: one file per key in a shared directory, atomic
//!   temp-then-rename writes, all I/O failures degrade to cache misses
//! - **Metrics**: lock-free hit/miss/eviction counters

pub mod disk;
pub mod error;
pub mod memory;
pub mod metrics;

pub use disk::DiskCache;
pub use error::{CacheError, Result};
pub use memory::{MemoryCache, MemoryCacheConfig};
pub use metrics::{CacheMetrics, CacheStats};
