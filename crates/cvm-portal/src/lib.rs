#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Report fetching from the CVM open data portal.
//!
//! This crate provides:
//!
//! - [`CvmConfig`] - portal endpoints, timeouts, cache lifetimes
//! - [`HttpTransport`] - rate limited GETs with retry on overload statuses
//! - [`CvmClient`] - cached downloads, company resolution and the concurrent
//!   multi-year statement fetch
//!
//! # Example
//!
//! ```no_run
//! use cvm_portal::{CvmClient, CvmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CvmClient::new(CvmConfig::from_env()?)?;
//!
//!     let dataset = client.get_consolidated_company_data("WEGE3", 3).await?;
//!     for report_type in dataset.report_types() {
//!         println!("{report_type}: {} rows", dataset.row_count(report_type));
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Report fetcher.
pub mod client;
/// Client configuration.
pub mod config;
/// Retrying HTTP transport.
pub mod http;

pub use client::{CvmClient, ReportData, YearData};
pub use config::{
    CADASTRAL_FILE, CvmConfig, DEFAULT_CAD_BASE_URL, DEFAULT_DFP_BASE_URL, DEFAULT_ITR_BASE_URL,
    MAX_CONCURRENT_DOWNLOADS,
};
pub use http::HttpTransport;
