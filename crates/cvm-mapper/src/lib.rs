#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Standardized figures over CVM filings.
//!
//! # Example
//!
//! ```
//! use cvm_core::ConsolidatedDataset;
//! use cvm_mapper::{AccountMapper, FinancialSummary};
//!
//! let dataset = ConsolidatedDataset::new();
//! let mapper = AccountMapper::new(&dataset);
//!
//! assert_eq!(mapper.get_revenue(None), 0.0);
//! for period in mapper.get_comparison_dates() {
//!     let summary = FinancialSummary::from_mapper(&mapper, &period);
//!     println!("{}: {}", summary.label, summary.net_income);
//! }
//! ```

/// Standard chart of accounts.
pub mod accounts;
/// Value added distribution and audit opinion.
pub mod disclosure;
/// Account lookups and trailing twelve month figures.
pub mod mapper;
/// Summaries, ratios and growth rates.
pub mod metrics;

pub use accounts::Account;
pub use disclosure::{AuditOpinion, WealthDistribution};
pub use mapper::AccountMapper;
pub use metrics::{FinancialSummary, GrowthRates, KeyMetrics, cagr, ratio};
