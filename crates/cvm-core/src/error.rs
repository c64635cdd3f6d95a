//! Error types for filing operations.
//!
//! This module defines [`CvmError`] which covers every failure that can occur
//! while downloading, parsing, resolving or caching regulatory filings, and
//! [`ErrorKind`] which groups them into the handling classes callers branch on.

use thiserror::Error;

use crate::family::ReportFamily;

/// Errors that can occur during filing operations.
#[derive(Error, Debug)]
pub enum CvmError {
    /// An identifier could not be resolved to a company.
    #[error("Company not found: {0}")]
    NotFound(String),

    /// A specific yearly archive does not exist upstream.
    #[error("{family} report not found for year {year}")]
    ReportNotFound {
        /// The report family that was requested.
        family: ReportFamily,
        /// The fiscal year that was requested.
        year: i32,
    },

    /// Network-related errors (connection failures, DNS, TLS, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// A request exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Malformed CSV, HTML or JSON content.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Corrupted or unreadable archive container.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Handling class of a [`CvmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unresolvable identity or an explicitly requested report that is absent.
    NotFound,
    /// Network failures, timeouts and retryable server statuses.
    Transient,
    /// Malformed archives, rows or values.
    DataIntegrity,
    /// Everything else (cache, configuration, client-side statuses).
    Other,
}

impl CvmError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::ReportNotFound { .. } => ErrorKind::NotFound,
            Self::Network(_) | Self::Timeout(_) => ErrorKind::Transient,
            Self::HttpStatus { status, .. } => match *status {
                404 => ErrorKind::NotFound,
                429 | 500..=599 => ErrorKind::Transient,
                _ => ErrorKind::Other,
            },
            Self::Parse(_) | Self::Archive(_) => ErrorKind::DataIntegrity,
            Self::Cache(_) | Self::InvalidParameter(_) | Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Returns `true` for network failures and retryable statuses.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Returns `true` when the requested entity does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

/// Result type alias using [`CvmError`].
pub type Result<T> = std::result::Result<T, CvmError>;
