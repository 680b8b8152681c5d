//! Configuration for the image loader.
//!
//! Settings are layered: built-in defaults, then the user file
//! `~/.elementkit/config/images.yaml`, then the project file
//! `config/images.yaml`. Each file may set any subset of fields; fields it
//! omits keep the value from the layer below.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use elementkit_cache::MemoryCacheConfig;
use elementkit_http::HttpConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ImageError, ImageResult};

/// Image loader configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Cache settings
    pub cache: CacheConfig,
    /// Thumbnail settings
    pub thumbnail: ThumbnailConfig,
    /// Network settings
    pub http: HttpSettings,
}

/// Memory and disk cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disk cache directory; platform cache dir when unset
    pub dir: Option<PathBuf>,
    /// Delay between release and memory eviction
    pub eviction_delay_seconds: u64,
    /// Maximum number of memory cache entries
    pub max_entries: usize,
    /// Maximum memory cache size in MB
    pub max_size_mb: u64,
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Longest side of a generated thumbnail
    pub max_dimension: u32,
    /// Whether oversized payloads are shrunk at all
    pub enabled: bool,
}

/// Network settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Retries after a failed attempt
    pub retry_count: u32,
    /// Initial retry backoff in milliseconds
    pub retry_delay_ms: u64,
    /// Cap on a single retry backoff in milliseconds
    pub max_retry_delay_ms: u64,
    /// User agent override
    pub user_agent: Option<String>,
    /// Proxy URL for all requests
    pub proxy: Option<String>,
    /// Redirects followed per request; 0 disables following
    pub max_redirects: usize,
    /// Keep idle connections for reuse
    pub pool_enabled: bool,
    /// Seconds an idle pooled connection is kept
    pub pool_idle_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            eviction_delay_seconds: 30,
            max_entries: 256,
            max_size_mb: 64,
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: 400,
            enabled: true,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            timeout_seconds: http.timeout.as_secs(),
            connect_timeout_seconds: http.connect_timeout.as_secs(),
            retry_count: http.retry_count,
            retry_delay_ms: http.retry_delay.as_millis() as u64,
            max_retry_delay_ms: http.max_retry_delay.as_millis() as u64,
            user_agent: None,
            proxy: None,
            max_redirects: http.max_redirects,
            pool_enabled: http.pool_idle_timeout.is_some(),
            pool_idle_timeout_seconds: http.pool_idle_timeout.map_or(90, |idle| idle.as_secs()),
        }
    }
}

/// One configuration file; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    cache: CacheLayer,
    thumbnail: ThumbnailLayer,
    http: HttpLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheLayer {
    dir: Option<PathBuf>,
    eviction_delay_seconds: Option<u64>,
    max_entries: Option<usize>,
    max_size_mb: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThumbnailLayer {
    max_dimension: Option<u32>,
    enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HttpLayer {
    timeout_seconds: Option<u64>,
    connect_timeout_seconds: Option<u64>,
    retry_count: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    user_agent: Option<String>,
    proxy: Option<String>,
    max_redirects: Option<usize>,
    pool_enabled: Option<bool>,
    pool_idle_timeout_seconds: Option<u64>,
}

macro_rules! overlay {
    ($target:expr, $layer:expr, $source:expr, $section:literal, [$($field:ident),*]) => {
        $(
            if let Some(value) = $layer.$field {
                debug!(key = concat!($section, ".", stringify!($field)), source = %$source, "Configuration merged");
                $target.$field = value;
            }
        )*
    };
}

impl ImageConfig {
    /// Load configuration from a YAML file over the built-in defaults.
    ///
    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> ImageResult<Self> {
        Self::default().with_file(path)
    }

    /// Load configuration with hierarchy support.
    ///
    /// Configuration hierarchy (highest to lowest priority):
    /// 1. Project-level config (`config/images.yaml`)
    /// 2. User-level config (`~/.elementkit/config/images.yaml`)
    /// 3. Built-in defaults
    pub fn load_with_hierarchy() -> ImageResult<Self> {
        let mut paths = Vec::new();
        if let Some(home) = dirs::home_dir() {
            paths.push(
                home.join(".elementkit")
                    .join("config")
                    .join("images.yaml"),
            );
        }
        paths.push(PathBuf::from("config").join("images.yaml"));
        Self::load_from_paths(&paths)
    }

    /// Apply each existing file in `paths` in order, later files winning.
    pub fn load_from_paths(paths: &[PathBuf]) -> ImageResult<Self> {
        paths
            .iter()
            .try_fold(Self::default(), |config, path| config.with_file(path))
    }

    /// Overlay the fields set in `path` onto this configuration.
    pub fn with_file(self, path: &Path) -> ImageResult<Self> {
        if !path.exists() {
            return Ok(self);
        }

        let content = std::fs::read_to_string(path)?;
        self.with_yaml(&content, &path.display().to_string())
    }

    fn with_yaml(mut self, content: &str, source: &str) -> ImageResult<Self> {
        // An empty document deserializes as null
        let layer: Option<ConfigLayer> = serde_yaml::from_str(content)?;
        let Some(layer) = layer else {
            return Ok(self);
        };

        if let Some(dir) = layer.cache.dir {
            self.cache.dir = Some(dir);
        }
        overlay!(
            self.cache,
            layer.cache,
            source,
            "cache",
            [eviction_delay_seconds, max_entries, max_size_mb]
        );
        overlay!(
            self.thumbnail,
            layer.thumbnail,
            source,
            "thumbnail",
            [max_dimension, enabled]
        );
        overlay!(
            self.http,
            layer.http,
            source,
            "http",
            [
                timeout_seconds,
                connect_timeout_seconds,
                retry_count,
                retry_delay_ms,
                max_retry_delay_ms,
                max_redirects,
                pool_enabled,
                pool_idle_timeout_seconds
            ]
        );
        if let Some(user_agent) = layer.http.user_agent {
            self.http.user_agent = Some(user_agent);
        }
        if let Some(proxy) = layer.http.proxy {
            self.http.proxy = Some(proxy);
        }

        Ok(self)
    }

    /// Serialize the configuration as YAML.
    pub fn to_yaml(&self) -> ImageResult<String> {
        serde_yaml::to_string(self).map_err(|e| ImageError::Serialization(e.to_string()))
    }

    /// Directory of the disk cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("elementkit")
                .join("images")
        })
    }

    /// Delay between release and memory eviction.
    pub fn eviction_delay(&self) -> Duration {
        Duration::from_secs(self.cache.eviction_delay_seconds)
    }

    /// Memory cache bounds.
    pub fn memory_cache_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_entries: self.cache.max_entries,
            ..Default::default()
        }
        .with_max_mb(self.cache.max_size_mb)
    }

    /// HTTP client configuration.
    pub fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig::new()
            .with_timeout(Duration::from_secs(self.http.timeout_seconds))
            .with_connect_timeout(Duration::from_secs(self.http.connect_timeout_seconds))
            .with_retry_count(self.http.retry_count)
            .with_retry_delay(Duration::from_millis(self.http.retry_delay_ms))
            .with_max_retry_delay(Duration::from_millis(self.http.max_retry_delay_ms))
            .with_max_redirects(self.http.max_redirects)
            .with_pool_idle_timeout(
                self.http
                    .pool_enabled
                    .then(|| Duration::from_secs(self.http.pool_idle_timeout_seconds)),
            );
        if let Some(user_agent) = &self.http.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        if let Some(proxy) = &self.http.proxy {
            config = config.with_proxy(proxy.clone());
        }
        config
    }
}
