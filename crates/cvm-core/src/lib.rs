#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for CVM regulatory filings.
//!
//! This crate provides the foundational abstractions shared by the parser,
//! registry, portal client and mapper:
//!
//! - [`CvmError`](error::CvmError) - Error taxonomy with [`ErrorKind`](error::ErrorKind)
//! - [`ReportFamily`](family::ReportFamily) and [`ReportType`](family::ReportType) - Archive naming
//! - [`ReportTable`](types::ReportTable) and [`ConsolidatedDataset`](types::ConsolidatedDataset) - Typed filings
//! - [`BlobCache`](cache::BlobCache) - Caching abstraction
//! - [`NameResolver`](provider::NameResolver) - Ticker name hints

/// Cache trait and namespaces for storing fetched artifacts.
pub mod cache;
/// Error types for filing operations.
pub mod error;
/// Report family and report type definitions.
pub mod family;
/// Traits for external collaborators.
pub mod provider;
/// Core data types (rows, tables, datasets, cadastral records).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{BlobCache, CacheNamespace, format_cache_key};
pub use error::{CvmError, ErrorKind, Result};
pub use family::{ReportFamily, ReportType};
pub use provider::NameResolver;
pub use types::{
    CadastralRecord, ComparisonPeriod, ConsolidatedDataset, DATE_FORMAT, ExerciseOrder,
    ReportRow, ReportTable, RowSelection, parse_date,
};
