#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cvm/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance ticker name hints.
//!
//! This crate provides [`YahooNameResolver`], which implements the
//! [`NameResolver`] trait from `cvm-core`.
//!
//! # Features
//!
//! - Company name lookup through the quote summary `price` module
//! - `.SA` suffix added for B3 tickers
//! - Built-in rate limiting (1 request per second by default)
//!
//! # Example
//!
//! ```no_run
//! use cvm_yahoo::YahooNameResolver;
//! use cvm_core::NameResolver;
//!
//! # async fn example() -> cvm_core::Result<()> {
//! let resolver = YahooNameResolver::new();
//! let name = resolver.resolve_name("WEGE3").await?;
//! println!("{name:?}");
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cvm_core::{CvmError, NameResolver, Result};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, instrument};

/// Yahoo Finance quote summary API base URL.
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// Request timeout; the hint is optional so it must not stall resolution.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Exchange suffix of B3 listings.
const B3_SUFFIX: &str = ".SA";

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Ticker-to-company-name resolver backed by Yahoo Finance.
#[derive(Debug)]
pub struct YahooNameResolver {
    client: reqwest::Client,
    base_url: String,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
}

impl Default for YahooNameResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooNameResolver {
    /// Create a resolver with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    /// Create a resolver with a custom HTTP client.
    ///
    /// Rate limiting is still applied.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: QUOTE_SUMMARY_URL.to_string(),
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Create a resolver with custom rate limiting.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: QUOTE_SUMMARY_URL.to_string(),
            rate_limit_ms: u64::try_from(rate_limit.as_millis()).unwrap_or(u64::MAX),
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Point the resolver at another quote summary endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn now_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = Self::now_millis().saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time
            .store(Self::now_millis(), Ordering::Relaxed);
    }

    /// Yahoo symbol for a B3 ticker: uppercase with `.SA`.
    #[must_use]
    pub fn yahoo_symbol(ticker: &str) -> String {
        let clean = ticker.trim().to_uppercase();
        if clean.ends_with(B3_SUFFIX) {
            clean
        } else {
            format!("{clean}{B3_SUFFIX}")
        }
    }

    /// Fetch the price module of the quote summary for a symbol.
    async fn fetch_price(&self, symbol: &str) -> Result<Option<PriceModule>> {
        self.apply_rate_limit().await;

        let url = format!("{}/{}?modules=price", self.base_url, symbol);
        debug!("Fetching quote summary: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CvmError::Timeout(e.to_string())
                } else {
                    CvmError::Network(e.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(CvmError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let summary = response
            .json::<QuoteSummaryResponse>()
            .await
            .map_err(|e| CvmError::Parse(e.to_string()))?;

        Ok(summary
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|data| data.price))
    }
}

#[async_trait]
impl NameResolver for YahooNameResolver {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    #[instrument(skip(self))]
    async fn resolve_name(&self, ticker: &str) -> Result<Option<String>> {
        let symbol = Self::yahoo_symbol(ticker);
        let price = self.fetch_price(&symbol).await?;

        let name = price.and_then(|p| {
            [p.long_name, p.short_name]
                .into_iter()
                .flatten()
                .map(|n| n.trim().to_string())
                .find(|n| !n.is_empty())
        });

        if let Some(name) = &name {
            debug!(symbol = %symbol, name = %name, "Yahoo identified company");
        }
        Ok(name)
    }
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryData {
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
}
