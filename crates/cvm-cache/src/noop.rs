//! No-op cache implementation.

use async_trait::async_trait;
use cvm_core::{BlobCache, CacheNamespace, Result};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// `load` always returns `Ok(None)` and `store` returns `Ok(())`.
/// Useful for disabling caching or testing code paths without cache hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BlobCache for NoopCache {
    async fn load(
        &self,
        namespace: CacheNamespace,
        key: &str,
        _ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        trace!(namespace = namespace.as_str(), key, "NoopCache: load called, returning None");
        Ok(None)
    }

    async fn store(&self, namespace: CacheNamespace, key: &str, _bytes: &[u8]) -> Result<()> {
        trace!(namespace = namespace.as_str(), key, "NoopCache: store called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _namespace: CacheNamespace, _ttl: Duration) -> Result<usize> {
        trace!("NoopCache: invalidate_stale called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_hits() {
        let cache = NoopCache::new();
        cache
            .store(CacheNamespace::Archives, "itr_cia_aberta_2023.zip", b"PK")
            .await
            .unwrap();
        let hit = cache
            .load(
                CacheNamespace::Archives,
                "itr_cia_aberta_2023.zip",
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert!(hit.is_none());
        assert_eq!(
            cache
                .invalidate_stale(CacheNamespace::Archives, Duration::ZERO)
                .await
                .unwrap(),
            0
        );
    }
}
