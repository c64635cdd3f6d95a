#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Company identity resolution.
//!
//! - [`CompanyRegistry`] - Resolve identifiers, look up tax ids and profiles
//! - [`CompanyMatcher`] - Pluggable name matching rule
//! - [`normalize_company_name`] - Strip punctuation and corporate suffixes

/// Name matching rules.
pub mod matcher;
/// Name normalization helpers.
pub mod normalize;
/// The registry and its resolution chain.
pub mod registry;

pub use matcher::{CompanyMatcher, ShortestNameMatcher};
pub use normalize::{is_market_ticker, normalize_company_name, ticker_root};
pub use registry::CompanyRegistry;
