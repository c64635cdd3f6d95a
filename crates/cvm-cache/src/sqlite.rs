//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cvm_core::{BlobCache, CacheNamespace, CvmError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based cache for filing artifacts.
///
/// This cache stores every namespace in one table of a SQLite database file,
/// providing persistence across application restarts. Queries run on the
/// blocking thread pool through `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| CvmError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| CvmError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CvmError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blob_cache (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                data BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )
        .map_err(|e| CvmError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_blob_namespace_cached_at
             ON blob_cache(namespace, cached_at)",
            [],
        )
        .map_err(|e| CvmError::Cache(e.to_string()))?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| CvmError::Cache(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| CvmError::Cache(format!("Cache task failed: {e}")))?
    }

    /// Fixed-width timestamp so stored values sort chronologically as text.
    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    fn cutoff(ttl: Duration) -> Result<DateTime<Utc>> {
        let ttl = chrono::TimeDelta::from_std(ttl)
            .map_err(|e| CvmError::Cache(format!("Invalid TTL duration: {e}")))?;
        Ok(Utc::now() - ttl)
    }
}

#[async_trait]
impl BlobCache for SqliteCache {
    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn load(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        let cutoff = Self::timestamp(Self::cutoff(ttl)?);
        let key = key.to_string();

        let data: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT data FROM blob_cache
                     WHERE namespace = ?1 AND key = ?2 AND cached_at >= ?3",
                    params![namespace.as_str(), key, cutoff],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CvmError::Cache(e.to_string()))
            })
            .await?;

        match &data {
            Some(bytes) => debug!(size = bytes.len(), "Cache hit"),
            None => debug!("Cache miss"),
        }
        Ok(data)
    }

    #[instrument(skip(self, bytes), fields(namespace = namespace.as_str(), size = bytes.len()))]
    async fn store(&self, namespace: CacheNamespace, key: &str, bytes: &[u8]) -> Result<()> {
        let cached_at = Self::timestamp(Utc::now());
        let key = key.to_string();
        let bytes = bytes.to_vec();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO blob_cache (namespace, key, data, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![namespace.as_str(), key, bytes, cached_at],
            )
            .map_err(|e| CvmError::Cache(e.to_string()))
        })
        .await?;

        debug!("Cached blob");
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = namespace.as_str()))]
    async fn invalidate_stale(&self, namespace: CacheNamespace, ttl: Duration) -> Result<usize> {
        let cutoff = Self::timestamp(Self::cutoff(ttl)?);

        let deleted = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM blob_cache WHERE namespace = ?1 AND cached_at < ?2",
                    params![namespace.as_str(), cutoff],
                )
                .map_err(|e| CvmError::Cache(e.to_string()))
            })
            .await?;

        if deleted > 0 {
            debug!("Invalidated {} stale cache entries", deleted);
        }

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM blob_cache", [])
                .map_err(|e| CvmError::Cache(e.to_string()))
        })
        .await?;

        debug!("Cleared all cache entries");
        Ok(())
    }
}
