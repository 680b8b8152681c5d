//! Cache orchestration: memory cache in front of the fetcher.

use std::{collections::HashMap, sync::Arc, time::Duration};

use elementkit_cache::{CacheStats, DiskCache, MemoryCache};
use elementkit_http::{shared_client, HttpClientTrait};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{
    coalesce::CoalescerStats,
    config::ImageConfig,
    error::ImageResult,
    fetcher::Fetcher,
    models::{CacheKey, CachePolicy, ImageRequest, ImageSource, LoadSource, LoadState, LoadedImage},
};

/// Loader settings that are not owned by one of its caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Delay between release and memory eviction
    pub eviction_delay: Duration,
    /// Thumbnail bound for requests that do not set one
    pub max_dimension: u32,
    /// Whether oversized payloads are shrunk
    pub thumbnails_enabled: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from_config(&ImageConfig::default())
    }
}

impl LoaderOptions {
    /// Options from the `cache` and `thumbnail` config sections
    pub fn from_config(config: &ImageConfig) -> Self {
        Self {
            eviction_delay: config.eviction_delay(),
            max_dimension: config.thumbnail.max_dimension,
            thumbnails_enabled: config.thumbnail.enabled,
        }
    }
}

/// Parse a locator and derive its cache key.
pub fn resolve(locator: &str, custom_key: Option<&str>) -> ImageResult<(ImageSource, CacheKey)> {
    let source = ImageSource::parse(locator)?;
    let key = CacheKey::derive(locator, &source, custom_key);
    Ok((source, key))
}

/// Progress of the loads currently running for one key.
#[derive(Debug, Clone, Copy)]
struct ActiveLoad {
    state: LoadState,
    loads: usize,
}

/// Registers a running load in the loader's active map and unregisters it on
/// drop, including when the load future is cancelled.
struct LoadTracker<'a> {
    active: &'a Mutex<HashMap<CacheKey, ActiveLoad>>,
    key: CacheKey,
}

impl<'a> LoadTracker<'a> {
    fn begin(active: &'a Mutex<HashMap<CacheKey, ActiveLoad>>, key: &CacheKey) -> Self {
        active
            .lock()
            .entry(key.clone())
            .and_modify(|load| load.loads += 1)
            .or_insert(ActiveLoad {
                state: LoadState::Idle,
                loads: 1,
            });
        Self {
            active,
            key: key.clone(),
        }
    }

    fn set(&self, state: LoadState) {
        let previous = self
            .active
            .lock()
            .get_mut(&self.key)
            .map(|load| std::mem::replace(&mut load.state, state));
        trace!(key = %self.key, from = ?previous.unwrap_or_default(), to = ?state, "Load state changed");
    }
}

impl Drop for LoadTracker<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if let Some(load) = active.get_mut(&self.key) {
            load.loads -= 1;
            if load.loads == 0 {
                active.remove(&self.key);
            }
        }
    }
}

/// Loads images through the memory cache, disk cache and network.
///
/// Construct one per application (or per cache directory) and share it via
/// `Arc`; every method takes `&self`.
pub struct ImageLoader {
    memory: MemoryCache,
    fetcher: Fetcher,
    active: Mutex<HashMap<CacheKey, ActiveLoad>>,
    options: LoaderOptions,
}

impl ImageLoader {
    /// Build a loader and its HTTP client from configuration.
    pub fn new(config: &ImageConfig) -> ImageResult<Self> {
        let http = shared_client(config.http_config())?;
        Ok(Self::with_parts(
            MemoryCache::with_config(config.memory_cache_config()),
            DiskCache::new(config.cache_dir()),
            http,
            LoaderOptions::from_config(config),
        ))
    }

    /// Assemble a loader from explicit parts.
    pub fn with_parts(
        memory: MemoryCache,
        disk: DiskCache,
        http: Arc<dyn HttpClientTrait>,
        options: LoaderOptions,
    ) -> Self {
        let fetcher = Fetcher::new(http, disk).with_thumbnails(options.thumbnails_enabled);
        Self {
            memory,
            fetcher,
            active: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// The memory cache
    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    /// The disk cache
    pub fn disk(&self) -> &DiskCache {
        self.fetcher.disk()
    }

    /// Loader settings
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Current state for `key`.
    ///
    /// While a load runs this is its latest step. Otherwise the key is
    /// [`LoadState::Ready`] if its bytes are in memory and
    /// [`LoadState::Idle`] if not; a failed load leaves it `Idle`.
    pub fn state(&self, key: &CacheKey) -> LoadState {
        if let Some(load) = self.active.lock().get(key) {
            return load.state;
        }
        if self.memory.contains(key.as_str()) {
            LoadState::Ready
        } else {
            LoadState::Idle
        }
    }

    /// Whether a load for `key` is running
    pub fn is_loading(&self, key: &CacheKey) -> bool {
        self.state(key).is_loading()
    }

    /// Number of keys with a load in progress
    pub fn active_loads(&self) -> usize {
        self.active.lock().len()
    }

    /// Load an image.
    ///
    /// Returns `None` when the locator is invalid or nothing could be
    /// fetched; the reason is logged.
    pub async fn load(&self, request: &ImageRequest) -> Option<LoadedImage> {
        if let Some(delay) = request.delay {
            tokio::time::sleep(delay).await;
        }

        let (source, key) = match resolve(&request.locator, request.custom_key.as_deref()) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(locator = %request.locator, error = %e, "Cannot load image");
                return None;
            }
        };
        let policy = source.effective_policy(request.policy);
        let tracker = LoadTracker::begin(&self.active, &key);

        if policy == CachePolicy::Cached {
            tracker.set(LoadState::CheckingMemory);
            if let Some(bytes) = self.memory.get(key.as_str()) {
                tracker.set(LoadState::Ready);
                debug!(key = %key, "Memory cache hit");
                return Some(LoadedImage {
                    key,
                    bytes,
                    source: LoadSource::Memory,
                });
            }
        }

        let max_dimension = request.max_dimension.unwrap_or(self.options.max_dimension);
        let observe = |state: LoadState| tracker.set(state);
        let fetched = self
            .fetcher
            .fetch_observed(&source, policy, &key, max_dimension, &observe)
            .await;

        let Some((bytes, origin)) = fetched else {
            tracker.set(LoadState::Failed);
            return None;
        };

        tracker.set(LoadState::Populating);
        if let Err(e) = self.memory.put(key.as_str(), bytes.clone()) {
            warn!(key = %key, error = %e, "Image not kept in memory");
        }
        tracker.set(LoadState::Ready);
        debug!(key = %key, source = %origin, bytes = bytes.len(), "Loaded image");

        Some(LoadedImage {
            key,
            bytes,
            source: origin,
        })
    }

    /// Run [`ImageLoader::load`] on the tokio runtime.
    pub fn spawn_load(self: &Arc<Self>, request: ImageRequest) -> JoinHandle<Option<LoadedImage>> {
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.load(&request).await })
    }

    /// Run [`ImageLoader::load`] on the tokio runtime and pass the image to
    /// `on_loaded`. The callback is not invoked when nothing was loaded.
    pub fn spawn_load_with<F>(self: &Arc<Self>, request: ImageRequest, on_loaded: F) -> JoinHandle<()>
    where
        F: FnOnce(LoadedImage) + Send + 'static,
    {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(image) = loader.load(&request).await {
                on_loaded(image);
            }
        })
    }

    /// Release interest in an image, scheduling its memory eviction after the
    /// configured delay. Returns whether a timer was armed.
    pub fn release(&self, locator: &str, custom_key: Option<&str>) -> bool {
        self.release_with_delay(locator, custom_key, self.options.eviction_delay)
    }

    /// [`ImageLoader::release`] with an explicit eviction delay.
    pub fn release_with_delay(&self, locator: &str, custom_key: Option<&str>, delay: Duration) -> bool {
        match resolve(locator, custom_key) {
            Ok((_, key)) => self.memory.schedule_evict(key.as_str(), delay),
            Err(e) => {
                debug!(locator, error = %e, "Nothing to release");
                false
            }
        }
    }

    /// Drop an image from both caches. Returns whether anything was removed.
    pub async fn invalidate(&self, locator: &str, custom_key: Option<&str>) -> bool {
        let Ok((_, key)) = resolve(locator, custom_key) else {
            return false;
        };

        let in_memory = self.memory.remove(key.as_str());
        let on_disk = self.disk().remove(key.as_str()).await;
        debug!(key = %key, in_memory, on_disk, "Invalidated image");
        in_memory || on_disk
    }

    /// Memory cache statistics
    pub fn stats(&self) -> CacheStats {
        self.memory.stats()
    }

    /// Fetch coalescing statistics
    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.fetcher.coalescer_stats()
    }
}
