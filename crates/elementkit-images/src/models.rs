//! Data models for image requests, cache keys and load results.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{ImageError, ImageResult};

/// Name under which an image is stored in both caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an explicit key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a locator.
    ///
    /// A non-empty `custom_key` wins. Otherwise the last path component of
    /// the source is used, and when there is none the hex SHA-256 of the
    /// whole locator.
    pub fn derive(locator: &str, source: &ImageSource, custom_key: Option<&str>) -> Self {
        if let Some(custom) = custom_key.filter(|k| !k.is_empty()) {
            return Self(custom.to_string());
        }

        match source.last_component() {
            Some(component) => Self(component),
            None => Self::hashed(locator),
        }
    }

    fn hashed(locator: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(locator.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether a load may be served from stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Skip both caches and ask intermediaries not to serve cached copies.
    Reload,
    /// Prefer stored content, falling back to the network on a miss.
    #[default]
    Cached,
}

impl CachePolicy {
    /// Get the policy as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::Reload => "reload",
            CachePolicy::Cached => "cached",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reload" => Ok(CachePolicy::Reload),
            "cached" => Ok(CachePolicy::Cached),
            other => Err(ImageError::Config(format!("Unknown cache policy: {other}"))),
        }
    }
}

/// Where an image locator points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `http` or `https` URL
    Remote(Url),
    /// `file://` URL or bare filesystem path
    Local(PathBuf),
}

impl ImageSource {
    /// Parse a locator string.
    pub fn parse(locator: &str) -> ImageResult<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(ImageError::InvalidSource("empty locator".to_string()));
        }

        match Url::parse(trimmed) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(ImageSource::Remote(url)),
                "file" => url.to_file_path().map(ImageSource::Local).map_err(|_| {
                    ImageError::InvalidSource(format!("not a usable file URL: {trimmed}"))
                }),
                // Windows drive letters parse as one-letter schemes
                scheme if scheme.len() == 1 => Ok(ImageSource::Local(PathBuf::from(trimmed))),
                scheme => Err(ImageError::InvalidSource(format!(
                    "unsupported scheme '{scheme}' in {trimmed}"
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(ImageSource::Local(PathBuf::from(trimmed)))
            }
            Err(e) => Err(ImageError::InvalidSource(format!("{trimmed}: {e}"))),
        }
    }

    /// Whether the source is read from the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, ImageSource::Local(_))
    }

    /// The policy actually applied: local files are always re-read.
    pub fn effective_policy(&self, requested: CachePolicy) -> CachePolicy {
        if self.is_local() {
            CachePolicy::Reload
        } else {
            requested
        }
    }

    fn last_component(&self) -> Option<String> {
        match self {
            ImageSource::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .map(|segment| match urlencoding::decode(segment) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => segment.to_string(),
                }),
            ImageSource::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .filter(|name| !name.is_empty()),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Remote(url) => write!(f, "{url}"),
            ImageSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Where a delivered image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Served from the memory cache
    Memory,
    /// Served from the disk cache
    Disk,
    /// Downloaded
    Network,
    /// Read from a local file
    LocalFile,
}

impl LoadSource {
    /// Get the source as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSource::Memory => "memory",
            LoadSource::Disk => "disk",
            LoadSource::Network => "network",
            LoadSource::LocalFile => "local_file",
        }
    }
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Key the image is cached under
    pub key: CacheKey,
    /// Encoded image bytes
    pub bytes: Bytes,
    /// Where the bytes came from
    pub source: LoadSource,
}

impl LoadedImage {
    /// Size of the encoded payload in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Loader progress for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Nothing known about the key
    #[default]
    Idle,
    /// Looking in the memory cache
    CheckingMemory,
    /// Looking in the disk cache
    CheckingDisk,
    /// Waiting on network or file I/O
    Fetching,
    /// Storing the result in the memory cache
    Populating,
    /// The last load produced an image
    Ready,
    /// The last load produced nothing
    Failed,
}

impl LoadState {
    /// Whether a load for the key is currently running.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            LoadState::CheckingMemory
                | LoadState::CheckingDisk
                | LoadState::Fetching
                | LoadState::Populating
        )
    }
}

/// A request to load one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// URL or filesystem path
    pub locator: String,
    /// Explicit cache key overriding the derived one
    pub custom_key: Option<String>,
    /// Cache policy
    pub policy: CachePolicy,
    /// Longest-side bound for thumbnailing; loader default when unset
    pub max_dimension: Option<u32>,
    /// Wait this long before starting the load
    pub delay: Option<Duration>,
}

impl ImageRequest {
    /// Create a request with the default (cached) policy.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            custom_key: None,
            policy: CachePolicy::default(),
            max_dimension: None,
            delay: None,
        }
    }

    /// Set an explicit cache key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.custom_key = Some(key.into());
        self
    }

    /// Set the cache policy
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the thumbnail bound
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = Some(max_dimension);
        self
    }

    /// Delay the start of the load
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
