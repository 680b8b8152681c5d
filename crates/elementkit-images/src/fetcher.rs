//! Network/file fetch with disk caching and single-flight coalescing.

use std::sync::Arc;

use bytes::Bytes;
use elementkit_cache::DiskCache;
use elementkit_http::{CacheDirective, HttpClientTrait};
use tracing::{debug, warn};

use crate::{
    coalesce::{Coalescer, CoalescerStats, Registration},
    error::{ImageError, ImageResult},
    models::{CacheKey, CachePolicy, ImageSource, LoadSource, LoadState},
    thumbnail::Thumbnailer,
};

/// Bytes and origin of a successful fetch; `None` when nothing was produced.
pub type FetchOutcome = Option<(Bytes, LoadSource)>;

/// Reload and cached fetches of one key are separate flights: a reload must
/// never be answered from disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlightKey {
    key: CacheKey,
    policy: CachePolicy,
}

/// Produces image bytes for cache misses.
pub struct Fetcher {
    http: Arc<dyn HttpClientTrait>,
    disk: DiskCache,
    thumbnails_enabled: bool,
    flights: Coalescer<FlightKey, FetchOutcome>,
}

impl Fetcher {
    /// Create a fetcher downloading through `http` and persisting to `disk`
    pub fn new(http: Arc<dyn HttpClientTrait>, disk: DiskCache) -> Self {
        Self {
            http,
            disk,
            thumbnails_enabled: true,
            flights: Coalescer::new(),
        }
    }

    /// Enable or disable thumbnailing of oversized payloads
    pub fn with_thumbnails(mut self, enabled: bool) -> Self {
        self.thumbnails_enabled = enabled;
        self
    }

    /// The disk cache this fetcher persists to
    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    /// Coalescing counters
    pub fn coalescer_stats(&self) -> CoalescerStats {
        self.flights.stats()
    }

    /// Fetches currently running on behalf of one or more callers
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight_count()
    }

    /// Fetch the image for `key`.
    ///
    /// With [`CachePolicy::Cached`] a disk entry is returned as-is; on a miss
    /// the payload is downloaded, thumbnailed if oversized and written to
    /// disk. With [`CachePolicy::Reload`] the payload is always fetched
    /// afresh and nothing is written to disk. Local sources are always
    /// reloaded. Failures are logged and yield `None`.
    pub async fn fetch(
        &self,
        source: &ImageSource,
        policy: CachePolicy,
        key: &CacheKey,
        max_dimension: u32,
    ) -> FetchOutcome {
        self.fetch_observed(source, policy, key, max_dimension, &|_| {})
            .await
    }

    pub(crate) async fn fetch_observed(
        &self,
        source: &ImageSource,
        policy: CachePolicy,
        key: &CacheKey,
        max_dimension: u32,
        observe: &(dyn Fn(LoadState) + Send + Sync),
    ) -> FetchOutcome {
        let policy = source.effective_policy(policy);
        let flight = FlightKey {
            key: key.clone(),
            policy,
        };

        match self.flights.register(&flight) {
            Registration::Leader(guard) => {
                let outcome = self
                    .fetch_uncoalesced(source, policy, key, max_dimension, observe)
                    .await;
                guard.complete(outcome.clone());
                outcome
            }
            Registration::Waiter(mut rx) => {
                observe(LoadState::Fetching);
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        debug!(key = %key, error = %e, "In-flight fetch was abandoned");
                        None
                    }
                }
            }
        }
    }

    async fn fetch_uncoalesced(
        &self,
        source: &ImageSource,
        policy: CachePolicy,
        key: &CacheKey,
        max_dimension: u32,
        observe: &(dyn Fn(LoadState) + Send + Sync),
    ) -> FetchOutcome {
        if policy == CachePolicy::Cached {
            observe(LoadState::CheckingDisk);
            if let Some(bytes) = self.disk.read(key.as_str()).await {
                return Some((bytes, LoadSource::Disk));
            }
        }

        observe(LoadState::Fetching);
        let (raw, origin) = match self.read_source(source, policy).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(key = %key, source = %source, error = %e, "Failed to fetch image");
                return None;
            }
        };

        let bytes = if self.thumbnails_enabled {
            Thumbnailer::new(max_dimension).shrink_async(raw).await
        } else {
            raw
        };

        if policy == CachePolicy::Cached {
            self.disk.write(key.as_str(), &bytes).await;
        }

        Some((bytes, origin))
    }

    async fn read_source(
        &self,
        source: &ImageSource,
        policy: CachePolicy,
    ) -> ImageResult<(Bytes, LoadSource)> {
        let (bytes, origin) = match source {
            ImageSource::Remote(url) => {
                let directive = match policy {
                    CachePolicy::Reload => CacheDirective::NoCache,
                    CachePolicy::Cached => CacheDirective::Default,
                };
                let bytes = self.http.get_bytes(url.as_str(), directive).await?;
                (bytes, LoadSource::Network)
            }
            ImageSource::Local(path) => {
                let bytes = Bytes::from(tokio::fs::read(path).await?);
                (bytes, LoadSource::LocalFile)
            }
        };

        if bytes.is_empty() {
            return Err(ImageError::Decode("empty payload".to_string()));
        }
        Ok((bytes, origin))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::test_support::{noisy_png, MockHttp};

    const URL: &str = "https://cdn.example.com/img/a.png";

    fn setup(http: MockHttp) -> (Arc<MockHttp>, Fetcher, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let http = Arc::new(http);
        let fetcher = Fetcher::new(http.clone(), DiskCache::new(temp_dir.path()));
        (http, fetcher, temp_dir)
    }

    fn remote() -> ImageSource {
        ImageSource::parse(URL).unwrap()
    }

    #[tokio::test]
    async fn test_cached_miss_downloads_and_persists() {
        let (http, fetcher, _dir) = setup(MockHttp::new());
        http.respond(URL, b"small image".to_vec());
        let key = CacheKey::new("a.png");

        let (bytes, origin) = fetcher
            .fetch(&remote(), CachePolicy::Cached, &key, 400)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"small image");
        assert_eq!(origin, LoadSource::Network);
        assert_eq!(http.directives(), vec![CacheDirective::Default]);
        assert!(fetcher.disk().has("a.png").await);

        let (bytes, origin) = fetcher
            .fetch(&remote(), CachePolicy::Cached, &key, 400)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"small image");
        assert_eq!(origin, LoadSource::Disk);
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_reload_bypasses_disk() {
        let (http, fetcher, _dir) = setup(MockHttp::new());
        http.respond(URL, b"fresh".to_vec());
        fetcher.disk().write("a.png", b"stale").await;
        let key = CacheKey::new("a.png");

        for _ in 0..2 {
            let (bytes, origin) = fetcher
                .fetch(&remote(), CachePolicy::Reload, &key, 400)
                .await
                .unwrap();
            assert_eq!(bytes.as_ref(), b"fresh");
            assert_eq!(origin, LoadSource::Network);
        }

        assert_eq!(http.calls(), 2);
        assert_eq!(http.directives(), vec![CacheDirective::NoCache; 2]);
        // Reload results are not persisted
        assert_eq!(fetcher.disk().read("a.png").await.unwrap().as_ref(), b"stale");
    }

    #[tokio::test]
    async fn test_local_file_always_reread() {
        let (http, fetcher, dir) = setup(MockHttp::new());
        let path = dir.path().join("source").join("b.png");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"version 1").unwrap();

        let source = ImageSource::Local(path.clone());
        let key = CacheKey::new("b.png");

        let (bytes, origin) = fetcher
            .fetch(&source, CachePolicy::Cached, &key, 400)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"version 1");
        assert_eq!(origin, LoadSource::LocalFile);

        std::fs::write(&path, b"version 2").unwrap();
        let (bytes, _) = fetcher
            .fetch(&source, CachePolicy::Cached, &key, 400)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"version 2");

        assert_eq!(http.calls(), 0);
        assert!(!fetcher.disk().has("b.png").await);
    }

    #[tokio::test]
    async fn test_failures_yield_none() {
        let (http, fetcher, dir) = setup(MockHttp::new());
        http.respond("https://cdn.example.com/empty.png", Bytes::new());

        let missing = CacheKey::new("a.png");
        assert!(fetcher
            .fetch(&remote(), CachePolicy::Cached, &missing, 400)
            .await
            .is_none());
        assert!(!fetcher.disk().has("a.png").await);

        let empty = ImageSource::parse("https://cdn.example.com/empty.png").unwrap();
        assert!(fetcher
            .fetch(&empty, CachePolicy::Cached, &CacheKey::new("empty.png"), 400)
            .await
            .is_none());

        let absent = ImageSource::Local(dir.path().join("nope.png"));
        assert!(fetcher
            .fetch(&absent, CachePolicy::Reload, &CacheKey::new("nope.png"), 400)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_oversized_payload_thumbnailed_before_persisting() {
        let (http, fetcher, _dir) = setup(MockHttp::new());
        let original = noisy_png(120, 60);
        http.respond(URL, original.clone());

        let (bytes, _) = fetcher
            .fetch(&remote(), CachePolicy::Cached, &CacheKey::new("a.png"), 20)
            .await
            .unwrap();

        assert!(bytes.len() < original.len());
        assert_eq!(fetcher.disk().read("a.png").await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_thumbnails_disabled_keeps_payload() {
        let temp_dir = TempDir::new().unwrap();
        let http = Arc::new(MockHttp::new());
        let original = noisy_png(120, 60);
        http.respond(URL, original.clone());
        let fetcher =
            Fetcher::new(http.clone(), DiskCache::new(temp_dir.path())).with_thumbnails(false);

        let (bytes, _) = fetcher
            .fetch(&remote(), CachePolicy::Cached, &CacheKey::new("a.png"), 20)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), original.as_slice());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_coalesce() {
        let (http, fetcher, _dir) =
            setup(MockHttp::new().with_latency(Duration::from_millis(50)));
        http.respond(URL, b"shared".to_vec());
        let key = CacheKey::new("a.png");
        let source = remote();

        let (a, b, c) = tokio::join!(
            fetcher.fetch(&source, CachePolicy::Cached, &key, 400),
            fetcher.fetch(&source, CachePolicy::Cached, &key, 400),
            fetcher.fetch(&source, CachePolicy::Cached, &key, 400),
        );

        assert_eq!(http.calls(), 1);
        for outcome in [a, b, c] {
            let (bytes, origin) = outcome.unwrap();
            assert_eq!(bytes.as_ref(), b"shared");
            assert_eq!(origin, LoadSource::Network);
        }

        let stats = fetcher.coalescer_stats();
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 2);
        assert_eq!(fetcher.in_flight(), 0);
    }
}
