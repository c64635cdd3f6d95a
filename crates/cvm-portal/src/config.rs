//! Portal endpoints, timeouts and cache policy.

use std::path::PathBuf;
use std::time::Duration;

use cvm_cache::FileCache;
use cvm_core::{CacheNamespace, CvmError, ReportFamily, ReportType, Result};

/// Quarterly (ITR) archive directory.
pub const DEFAULT_ITR_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/ITR/DADOS/";

/// Annual (DFP) archive directory.
pub const DEFAULT_DFP_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/DFP/DADOS/";

/// Cadastral registry directory.
pub const DEFAULT_CAD_BASE_URL: &str = "https://dados.cvm.gov.br/dados/CIA_ABERTA/CAD/DADOS/";

/// Cadastral registry file name, also its cache key.
pub const CADASTRAL_FILE: &str = "cad_cia_aberta.csv";

/// Upper bound on concurrent per-year workers.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 5;

/// Some portal front-ends reject clients without a browser agent.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Configuration of a [`CvmClient`](crate::CvmClient).
#[derive(Debug, Clone)]
pub struct CvmConfig {
    /// Quarterly archive directory URL.
    pub itr_base_url: String,
    /// Annual archive directory URL.
    pub dfp_base_url: String,
    /// Cadastral registry directory URL.
    pub cad_base_url: String,
    /// Cadastral registry file name.
    pub cadastral_file: String,
    /// Statements extracted from every archive.
    pub report_types: Vec<ReportType>,
    /// Consolidated rather than individual statements.
    pub consolidated: bool,
    /// Concurrent per-year workers, within `1..=5`.
    pub max_concurrency: usize,
    /// Timeout of ordinary requests.
    pub request_timeout: Duration,
    /// Timeout of yearly archive downloads.
    pub archive_timeout: Duration,
    /// Timeout of the year index listing.
    pub index_timeout: Duration,
    /// Lifetime of cached archives.
    pub archive_ttl: Duration,
    /// Lifetime of the cached cadastral registry.
    pub cadastral_ttl: Duration,
    /// Lifetime of cached per-company datasets.
    pub dataset_ttl: Duration,
    /// Transport retries on retryable statuses and connection failures.
    pub retries: u32,
    /// First retry delay, doubled on every further attempt.
    pub backoff_base: Duration,
    /// Minimum spacing between request starts.
    pub min_request_interval: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Root directory of the filesystem cache.
    pub cache_dir: PathBuf,
}

impl Default for CvmConfig {
    fn default() -> Self {
        Self {
            itr_base_url: DEFAULT_ITR_BASE_URL.to_string(),
            dfp_base_url: DEFAULT_DFP_BASE_URL.to_string(),
            cad_base_url: DEFAULT_CAD_BASE_URL.to_string(),
            cadastral_file: CADASTRAL_FILE.to_string(),
            report_types: ReportType::ALL.to_vec(),
            consolidated: true,
            max_concurrency: MAX_CONCURRENT_DOWNLOADS,
            request_timeout: Duration::from_secs(30),
            archive_timeout: Duration::from_secs(60),
            index_timeout: Duration::from_secs(10),
            archive_ttl: CacheNamespace::Archives.default_ttl(),
            cadastral_ttl: CacheNamespace::Cadastral.default_ttl(),
            dataset_ttl: CacheNamespace::Datasets.default_ttl(),
            retries: 3,
            backoff_base: Duration::from_millis(500),
            min_request_interval: Duration::from_millis(50),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_dir: FileCache::default_root(),
        }
    }
}

impl CvmConfig {
    /// Defaults overridden by `CVM_BASE_URL_ITR`, `CVM_BASE_URL_DFP`,
    /// `CVM_BASE_URL_CAD`, `CVM_REPORT_TYPES` and `CVM_CACHE_DIR`.
    ///
    /// # Errors
    /// Returns [`CvmError::InvalidParameter`] when `CVM_REPORT_TYPES` names an
    /// unknown statement.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("CVM_BASE_URL_ITR") {
            config.itr_base_url = url;
        }
        if let Some(url) = var("CVM_BASE_URL_DFP") {
            config.dfp_base_url = url;
        }
        if let Some(url) = var("CVM_BASE_URL_CAD") {
            config.cad_base_url = url;
        }
        if let Some(types) = var("CVM_REPORT_TYPES") {
            config.report_types = parse_report_types(&types)?;
        }
        if let Some(dir) = var("CVM_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Points both archive families and the registry at one server root,
    /// keeping the portal's directory layout.
    #[must_use]
    pub fn with_portal_root(mut self, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        self.itr_base_url = format!("{root}/dados/CIA_ABERTA/DOC/ITR/DADOS/");
        self.dfp_base_url = format!("{root}/dados/CIA_ABERTA/DOC/DFP/DADOS/");
        self.cad_base_url = format!("{root}/dados/CIA_ABERTA/CAD/DADOS/");
        self
    }

    /// Set the statements to extract.
    #[must_use]
    pub fn with_report_types(mut self, report_types: impl Into<Vec<ReportType>>) -> Self {
        self.report_types = report_types.into();
        self
    }

    /// Extract individual instead of consolidated statements.
    #[must_use]
    pub const fn with_consolidated(mut self, consolidated: bool) -> Self {
        self.consolidated = consolidated;
        self
    }

    /// Set the worker count, clamped to `1..=5`.
    #[must_use]
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers.clamp(1, MAX_CONCURRENT_DOWNLOADS);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32, backoff_base: Duration) -> Self {
        self.retries = retries;
        self.backoff_base = backoff_base;
        self
    }

    /// Set the minimum spacing between requests.
    #[must_use]
    pub const fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Set the filesystem cache root.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Directory URL of a family's archives.
    #[must_use]
    pub fn base_url(&self, family: ReportFamily) -> &str {
        match family {
            ReportFamily::Itr => &self.itr_base_url,
            ReportFamily::Dfp => &self.dfp_base_url,
        }
    }

    /// Download URL of a yearly archive.
    #[must_use]
    pub fn archive_url(&self, family: ReportFamily, year: i32) -> String {
        join_url(self.base_url(family), &family.archive_name(year))
    }

    /// Download URL of the cadastral registry.
    #[must_use]
    pub fn cadastral_url(&self) -> String {
        join_url(&self.cad_base_url, &self.cadastral_file)
    }

    /// Worker count actually used, within `1..=5`.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, MAX_CONCURRENT_DOWNLOADS)
    }
}

fn parse_report_types(value: &str) -> Result<Vec<ReportType>> {
    let types = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<ReportType>>>()?;
    if types.is_empty() {
        return Err(CvmError::InvalidParameter(
            "CVM_REPORT_TYPES names no report type".to_string(),
        ));
    }
    Ok(types)
}

fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}
