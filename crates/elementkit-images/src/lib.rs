//! Asynchronous image loading for elementkit.
//!
//! A request for an image locator goes through three tiers:
//! - the memory cache, whose entries are evicted a fixed delay after the
//!   consumer releases them unless they are read again first
//! - the disk cache, one file per key in a shared directory
//! - the network or local filesystem, with oversized payloads shrunk to a
//!   bounded thumbnail before they are cached
//!
//! Concurrent requests for the same key share one fetch.

pub mod coalesce;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod formats;
pub mod loader;
pub mod models;
pub mod thumbnail;

#[cfg(test)]
mod test_support;

pub use coalesce::CoalescerStats;
pub use config::{CacheConfig, HttpSettings, ImageConfig, ThumbnailConfig};
pub use error::{ImageError, ImageResult};
pub use fetcher::{FetchOutcome, Fetcher};
pub use formats::ImageFormat;
pub use loader::{resolve, ImageLoader, LoaderOptions};
pub use models::{
    CacheKey, CachePolicy, ImageRequest, ImageSource, LoadSource, LoadState, LoadedImage,
};
pub use thumbnail::Thumbnailer;
