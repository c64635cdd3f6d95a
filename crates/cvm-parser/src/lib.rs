#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Parsers for CVM bulk filings.
//!
//! Every function here is a pure transform over bytes already in memory.
//! Recoverable conditions (a missing member file, a company absent from a
//! statement, a corrupted archive) degrade to empty results and are logged;
//! only the cadastral registry treats malformed content as fatal.

/// Cadastral registry parsing.
pub mod cadastral;
/// Portal directory listing parsing.
pub mod index;
/// Statement CSV and yearly archive parsing.
pub mod report;
/// Text decoding and numeric normalization.
pub mod text;

pub use cadastral::parse_cadastral_csv;
pub use index::extract_years_from_html;
pub use report::{ArchiveRequest, CompanyKey, parse_archive, parse_report_csv};
pub use text::{TextEncoding, decode_text, numeric_code, parse_number};
