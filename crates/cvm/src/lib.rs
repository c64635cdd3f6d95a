#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Brazilian CVM filings.
//!
//! This crate re-exports the core types, the cache backends, the portal
//! client and the account mapper, and wires them into [`CvmService`].
//!
//! # Features
//!
//! - `yahoo` - Yahoo Finance ticker name hints for company resolution
//! - `cache-sqlite` - SQLite-based caching

// Core types and traits
pub use cvm_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use cvm_cache::SqliteCache;
pub use cvm_cache::{FileCache, InMemoryCache, NoopCache};

// Parsing, resolution, retrieval and mapping
pub use cvm_mapper::{
    Account, AccountMapper, AuditOpinion, FinancialSummary, GrowthRates, KeyMetrics,
    WealthDistribution, accounts, cagr,
};
pub use cvm_parser::{extract_years_from_html, parse_archive, parse_cadastral_csv};
pub use cvm_portal::{CvmClient, CvmConfig, HttpTransport};
pub use cvm_registry::{CompanyMatcher, CompanyRegistry, ShortestNameMatcher, normalize_company_name};

// Name hints
#[cfg(feature = "yahoo")]
pub use cvm_yahoo::YahooNameResolver;

mod service;
pub use service::{CompanyProfile, CvmService};
