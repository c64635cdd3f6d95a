//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::Utc;
use cvm_core::{BlobCache, CacheNamespace, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    cached_at: chrono::DateTime<Utc>,
}

impl CacheEntry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Key for cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BlobKey {
    namespace: CacheNamespace,
    key: String,
}

/// Simple in-memory cache for testing and development.
///
/// Blobs are stored in a `RwLock`-protected `HashMap` and are lost when the
/// cache is dropped. Bytes are cloned on load and store.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<BlobKey, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl BlobCache for InMemoryCache {
    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn load(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        let lookup = BlobKey {
            namespace,
            key: key.to_string(),
        };

        let cache = self.entries.read().await;
        match cache.get(&lookup) {
            Some(entry) if !entry.is_stale(ttl) => {
                debug!("Cache hit");
                Ok(Some(entry.data.clone()))
            }
            Some(_) => {
                debug!("Cache entry stale");
                Ok(None)
            }
            None => {
                debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, bytes), fields(namespace = namespace.as_str(), size = bytes.len()))]
    async fn store(&self, namespace: CacheNamespace, key: &str, bytes: &[u8]) -> Result<()> {
        let entry_key = BlobKey {
            namespace,
            key: key.to_string(),
        };

        let mut cache = self.entries.write().await;
        cache.insert(entry_key, CacheEntry::new(bytes.to_vec()));
        debug!("Cached blob");
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn invalidate_stale(&self, namespace: CacheNamespace, ttl: Duration) -> Result<usize> {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|k, entry| k.namespace != namespace || !entry.is_stale(ttl));
        let removed = before - cache.len();

        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }

        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}
