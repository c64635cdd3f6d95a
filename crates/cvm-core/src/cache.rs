//! Cache trait for storing fetched filing artifacts.
//!
//! This module defines the [`BlobCache`] trait, a byte-oriented store split
//! into [`CacheNamespace`]s. Validity of a blob is decided by its age versus
//! the TTL the caller passes in.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Independent cache areas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheNamespace {
    /// Raw yearly archives, keyed by archive name.
    Archives,
    /// Cadastral registry file, single fixed key.
    Cadastral,
    /// Serialized per-company datasets, keyed by normalized ticker.
    Datasets,
}

impl CacheNamespace {
    /// Every namespace.
    pub const ALL: [Self; 3] = [Self::Archives, Self::Cadastral, Self::Datasets];

    /// Directory of the namespace under the cache root.
    #[must_use]
    pub const fn dir(&self) -> &'static str {
        match self {
            Self::Archives | Self::Cadastral => "cvm",
            Self::Datasets => "financials",
        }
    }

    /// Stable name used by keyed backends.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Archives => "archives",
            Self::Cadastral => "cadastral",
            Self::Datasets => "datasets",
        }
    }

    /// File extension of the blobs stored in the namespace.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Archives => "zip",
            Self::Cadastral => "csv",
            Self::Datasets => "json",
        }
    }

    /// Default time-to-live of blobs in the namespace.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        match self {
            Self::Archives | Self::Cadastral => Duration::from_secs(24 * 60 * 60),
            Self::Datasets => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Builds the dataset cache key for an identifier.
///
/// The identifier is uppercased, spaces become `_`, and `.` and `/` are
/// dropped: `"weg s.a."` with `"financials_5y"` gives `WEG_SA_financials_5y.json`.
#[must_use]
pub fn format_cache_key(identifier: &str, suffix: &str) -> String {
    let safe: String = identifier
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| *c != '.' && *c != '/')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();
    format!("{safe}_{suffix}.json")
}

/// Trait for caching raw and derived filing artifacts.
///
/// Implementations can store data in various backends (filesystem, SQLite,
/// in-memory) to avoid repeated downloads of large archives.
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Retrieves a blob if it exists and is younger than `ttl`.
    ///
    /// Returns `Ok(Some(bytes))` on a fresh hit, `Ok(None)` if absent or stale.
    async fn load(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>>;

    /// Stores a blob, replacing any previous value for the key.
    async fn store(&self, namespace: CacheNamespace, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removes blobs of a namespace older than the specified TTL.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self, namespace: CacheNamespace, ttl: Duration) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
