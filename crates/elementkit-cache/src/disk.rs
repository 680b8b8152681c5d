//! Filesystem-backed image cache.
//!
//! One file per cache key inside a single shared directory. There is no
//! index: presence of the file is the only record, so a missing or
//! unreadable file simply behaves as a miss.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::{CacheError, Result};

const TEMP_SUFFIX: &str = ".tmp";

/// Characters that cannot appear verbatim in a cache file name. `%` is
/// included so that escaped names stay unambiguous.
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '%'];

/// Percent-escape reserved and control characters. Distinct keys always map
/// to distinct file names.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if RESERVED.contains(&c) || c.is_ascii_control() {
            escaped.push_str(&format!("%{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Disk cache rooted at a shared directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    base_path: PathBuf,
}

impl DiskCache {
    /// Create a disk cache rooted at `base_path`.
    ///
    /// The directory is created lazily on the first write.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// The shared cache directory
    pub fn dir(&self) -> &Path {
        &self.base_path
    }

    /// Resolve the file path for a key
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." {
            return Err(CacheError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.base_path.join(escape_key(key)))
    }

    async fn ensure_base_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    /// Whether a file exists for `key`
    pub async fn has(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Read the bytes stored for `key`
    pub async fn read(&self, key: &str) -> Option<Bytes> {
        let path = self.path_for(key).ok()?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!(key, bytes = data.len(), "Disk cache hit");
                Some(Bytes::from(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key, "Disk cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read disk cache entry");
                None
            }
        }
    }

    /// Replace the entry for `key` with `data`.
    ///
    /// Returns `false` if the entry could not be written; the failure is
    /// logged and otherwise ignored.
    pub async fn write(&self, key: &str, data: &[u8]) -> bool {
        match self.try_write(key, data).await {
            Ok(()) => {
                debug!(key, bytes = data.len(), "Wrote disk cache entry");
                true
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to write disk cache entry");
                false
            }
        }
    }

    async fn try_write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        self.ensure_base_dir().await?;

        // Best-effort: a stale file that cannot be removed is still replaced
        // by the rename below.
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != ErrorKind::NotFound {
                debug!(key, error = %e, "Could not remove previous disk cache entry");
            }
        }

        let temp_path = self.temp_path_for(&path);
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path_for(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.base_path
            .join(format!(".{}.{}{}", name, uuid::Uuid::new_v4().simple(), TEMP_SUFFIX))
    }

    /// Remove the entry for `key`
    pub async fn remove(&self, key: &str) -> bool {
        let Ok(path) = self.path_for(key) else {
            return false;
        };
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key, error = %e, "Failed to remove disk cache entry");
                false
            }
        }
    }

    /// Remove every file in the cache directory, returning how many were removed
    pub async fn clear(&self) -> usize {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.base_path.display(), error = %e, "Failed to list disk cache");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read disk cache directory entry");
                    break;
                }
            };
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }
        debug!(removed, "Cleared disk cache");
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path());

        assert!(!cache.has("a.png").await);
        assert!(cache.write("a.png", b"image bytes").await);
        assert!(cache.has("a.png").await);
        assert_eq!(
            cache.read("a.png").await,
            Some(Bytes::from_static(b"image bytes"))
        );
        assert!(temp_dir.path().join("a.png").is_file());
    }

    #[tokio::test]
    async fn test_directory_created_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("caches").join("images");
        let cache = DiskCache::new(&base);

        assert!(!cache.has("a.png").await);
        assert_eq!(cache.read("a.png").await, None);
        assert!(!base.exists());

        assert!(cache.write("a.png", b"x").await);
        assert!(base.is_dir());
    }

    #[tokio::test]
    async fn test_write_overwrites_previous_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path());

        cache.write("k", b"first version").await;
        cache.write("k", b"second").await;

        assert_eq!(cache.read("k").await, Some(Bytes::from_static(b"second")));
        let files: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1, "no temp files should be left behind");
    }

    #[tokio::test]
    async fn test_key_escaping() {
        let cache = DiskCache::new("/tmp/elementkit");
        let path = cache.path_for("avatars/user:1.png").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/elementkit/avatars%2Fuser%3A1.png"));
        assert_eq!(
            cache.path_for("my photo.png").unwrap(),
            PathBuf::from("/tmp/elementkit/my photo.png")
        );
        assert_eq!(
            cache.path_for("100%.png").unwrap(),
            PathBuf::from("/tmp/elementkit/100%25.png")
        );

        assert!(matches!(
            cache.path_for(".."),
            Err(CacheError::InvalidKey { .. })
        ));
        assert!(cache.path_for("").is_err());
    }

    #[tokio::test]
    async fn test_similar_keys_do_not_share_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path());
        let keys = ["a/b", "a_b", "a%2Fb", "a:b", "a\\b"];

        for key in keys {
            assert!(cache.write(key, key.as_bytes()).await);
        }
        for key in keys {
            assert_eq!(cache.read(key).await, Some(Bytes::copy_from_slice(key.as_bytes())));
        }
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), keys.len());
    }

    #[tokio::test]
    async fn test_invalid_key_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path());

        assert!(!cache.write("", b"data").await);
        assert!(!cache.has("").await);
        assert_eq!(cache.read("..").await, None);
    }

    #[tokio::test]
    async fn test_write_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let cache = DiskCache::new(blocker.join("images"));
        assert!(!cache.write("a.png", b"data").await);
        assert_eq!(cache.read("a.png").await, None);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path());

        cache.write("a", b"1").await;
        cache.write("b", b"2").await;
        cache.write("c", b"3").await;

        assert!(cache.remove("a").await);
        assert!(!cache.remove("a").await);
        assert_eq!(cache.clear().await, 2);
        assert!(!cache.has("b").await);
    }

    #[tokio::test]
    async fn test_clear_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::new(temp_dir.path().join("never-created"));
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_same_key() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(DiskCache::new(temp_dir.path()));
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 * 1024]).collect();

        let mut tasks = Vec::new();
        for payload in payloads.clone() {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                cache.write("shared.png", &payload).await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = cache.read("shared.png").await.unwrap();
        assert!(
            payloads.iter().any(|p| p.as_slice() == stored.as_ref()),
            "stored file must be exactly one writer's payload"
        );
    }
}
