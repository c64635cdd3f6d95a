//! Filesystem cache implementation.

use async_trait::async_trait;
use cvm_core::{BlobCache, CacheNamespace, CvmError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, instrument, warn};

/// Directory name under the platform cache dir.
const CACHE_DIR_NAME: &str = "cvm-filings";

/// Sequence for temporary file names, unique per write within the process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Filesystem cache storing one file per key.
///
/// Blobs live at `{root}/{namespace dir}/{key}`; freshness is judged from the
/// file's modification time. Every write goes through its own temporary file
/// and a rename, so concurrent writers of one key never interleave and
/// readers never observe a partially written blob.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root: the platform cache directory, or `.cache` in the
    /// working directory when the platform has none.
    #[must_use]
    pub fn default_root() -> PathBuf {
        dirs::cache_dir().map_or_else(
            || PathBuf::from(".cache").join(CACHE_DIR_NAME),
            |dir| dir.join(CACHE_DIR_NAME),
        )
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a key inside a namespace.
    ///
    /// # Errors
    /// Returns an error if the key could escape the namespace directory.
    pub fn path_for(&self, namespace: CacheNamespace, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(CvmError::InvalidParameter(format!("invalid cache key: {key}")));
        }
        Ok(self.root.join(namespace.dir()).join(key))
    }

    fn is_expired(modified: SystemTime, ttl: Duration) -> bool {
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > ttl)
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

#[async_trait]
impl BlobCache for FileCache {
    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn load(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(namespace, key)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache miss");
                return Ok(None);
            }
            Err(e) => return Err(CvmError::Cache(e.to_string())),
        };

        let modified = metadata
            .modified()
            .map_err(|e| CvmError::Cache(e.to_string()))?;
        if Self::is_expired(modified, ttl) {
            debug!("Cache entry stale");
            return Ok(None);
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(size = bytes.len(), "Cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CvmError::Cache(e.to_string())),
        }
    }

    #[instrument(skip(self, bytes), fields(namespace = namespace.as_str(), size = bytes.len()))]
    async fn store(&self, namespace: CacheNamespace, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(namespace, key)?;
        let dir = self.root.join(namespace.dir());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CvmError::Cache(e.to_string()))?;

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(".{key}.{}.{seq}.tmp", std::process::id()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CvmError::Cache(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CvmError::Cache(e.to_string()));
        }

        debug!(path = %path.display(), "Cached blob");
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn invalidate_stale(&self, namespace: CacheNamespace, ttl: Duration) -> Result<usize> {
        let dir = self.root.join(namespace.dir());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CvmError::Cache(e.to_string())),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CvmError::Cache(e.to_string()))?
        {
            let path = entry.path();
            // Namespaces may share a directory; only touch our own blobs.
            if path.extension().and_then(|e| e.to_str()) != Some(namespace.extension()) {
                continue;
            }
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            if Self::is_expired(modified, ttl) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale blob"),
                }
            }
        }

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let mut dirs: Vec<&str> = CacheNamespace::ALL.iter().map(CacheNamespace::dir).collect();
        dirs.dedup();
        for dir in dirs {
            match tokio::fs::remove_dir_all(self.root.join(dir)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CvmError::Cache(e.to_string())),
            }
        }
        debug!("Cleared all cache entries");
        Ok(())
    }
}
