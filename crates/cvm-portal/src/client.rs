//! Report fetcher for the CVM open data portal.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local};
use cvm_cache::FileCache;
use cvm_core::{
    BlobCache, CacheNamespace, ConsolidatedDataset, CvmError, ErrorKind, NameResolver,
    ReportFamily, ReportTable, ReportType, Result, format_cache_key,
};
use cvm_parser::{ArchiveRequest, CompanyKey, extract_years_from_html, parse_archive, parse_cadastral_csv};
use cvm_registry::CompanyRegistry;
use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

use crate::config::CvmConfig;
use crate::http::HttpTransport;

/// Statements parsed out of one yearly archive.
pub type ReportData = BTreeMap<ReportType, ReportTable>;

/// What one per-year worker produced.
#[derive(Debug, Default)]
pub struct YearData {
    /// Fiscal year fetched.
    pub year: i32,
    /// One partial result per family that yielded rows.
    pub partials: Vec<ReportData>,
    /// Last transient failure hit while fetching the year.
    pub transient_failure: Option<CvmError>,
}

impl YearData {
    /// Rows parsed for `report_type` across the year's partials.
    #[must_use]
    pub fn row_count(&self, report_type: ReportType) -> usize {
        self.partials
            .iter()
            .filter_map(|p| p.get(&report_type))
            .map(ReportTable::len)
            .sum()
    }
}

/// Client for the CVM open data portal.
///
/// Downloads go through a [`BlobCache`]: yearly archives and the cadastral
/// registry are kept for a day, assembled company datasets for a month.
pub struct CvmClient {
    config: CvmConfig,
    http: HttpTransport,
    cache: Arc<dyn BlobCache>,
    name_hints: Option<Arc<dyn NameResolver>>,
    registry: OnceCell<Arc<CompanyRegistry>>,
}

impl std::fmt::Debug for CvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvmClient")
            .field("config", &self.config)
            .field("registry_loaded", &self.registry.initialized())
            .field("name_hints", &self.name_hints.as_ref().map(|r| r.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl CvmClient {
    /// Client caching under `config.cache_dir` on the filesystem.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CvmConfig) -> Result<Self> {
        let cache = Arc::new(FileCache::new(config.cache_dir.clone()));
        Self::with_cache(config, cache)
    }

    /// Client backed by an explicit cache.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_cache(config: CvmConfig, cache: Arc<dyn BlobCache>) -> Result<Self> {
        let http = HttpTransport::new(&config)?;
        Ok(Self {
            config,
            http,
            cache,
            name_hints: None,
            registry: OnceCell::new(),
        })
    }

    /// Use `resolver` for ticker name hints during identity resolution.
    #[must_use]
    pub fn with_name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.name_hints = Some(resolver);
        self
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &CvmConfig {
        &self.config
    }

    /// Cache backing the client.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn BlobCache> {
        &self.cache
    }

    // ========================================================================
    // Cached downloads
    // ========================================================================

    /// Returns cached bytes for `key` when fresh, otherwise downloads `url`
    /// and stores the body. Cache failures are logged and never fail the call.
    async fn download_cached(
        &self,
        namespace: CacheNamespace,
        key: &str,
        url: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        match self.cache.load(namespace, key, ttl).await {
            Ok(Some(bytes)) => {
                debug!(namespace = namespace.as_str(), key, "Cache hit");
                return Ok(bytes);
            }
            Ok(None) => debug!(namespace = namespace.as_str(), key, "Cache miss"),
            Err(e) => warn!(namespace = namespace.as_str(), key, error = %e, "Cache read failed"),
        }

        info!(url, "Downloading");
        let bytes = self.http.get_bytes(url, timeout).await?;

        if let Err(e) = self.cache.store(namespace, key, &bytes).await {
            warn!(namespace = namespace.as_str(), key, error = %e, "Cache write failed");
        }
        Ok(bytes)
    }

    // ========================================================================
    // Company registry
    // ========================================================================

    /// Registry of listed companies, loaded once per client.
    ///
    /// # Errors
    /// Fails when the registry cannot be downloaded or parsed; nothing
    /// downstream works without it.
    #[instrument(skip(self))]
    pub async fn get_cadastral_data(&self) -> Result<Arc<CompanyRegistry>> {
        let registry = self
            .registry
            .get_or_try_init(|| async {
                let bytes = self
                    .download_cached(
                        CacheNamespace::Cadastral,
                        &self.config.cadastral_file,
                        &self.config.cadastral_url(),
                        self.config.cadastral_ttl,
                        self.config.request_timeout,
                    )
                    .await?;

                let records = tokio::task::spawn_blocking(move || parse_cadastral_csv(&bytes))
                    .await
                    .map_err(|e| CvmError::Other(format!("Cadastral parse task failed: {e}")))?
                    .inspect_err(|e| error!(error = %e, "Cadastral registry is unreadable"))?;
                info!(companies = records.len(), "Cadastral registry loaded");

                let mut registry = CompanyRegistry::new(records);
                if let Some(resolver) = &self.name_hints {
                    registry = registry.with_name_resolver(Arc::clone(resolver));
                }
                Ok::<_, CvmError>(Arc::new(registry))
            })
            .await?;
        Ok(Arc::clone(registry))
    }

    /// Regulator code of the company behind `identifier`, `None` if unknown.
    ///
    /// # Errors
    /// Fails only when the registry cannot be loaded.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<String>> {
        let registry = self.get_cadastral_data().await?;
        Ok(registry.resolve(identifier).await)
    }

    /// Tax id registered under `code`, `None` if unknown.
    ///
    /// # Errors
    /// Fails only when the registry cannot be loaded.
    pub async fn get_tax_id(&self, code: &str) -> Result<Option<String>> {
        let registry = self.get_cadastral_data().await?;
        Ok(registry.tax_id(code).map(str::to_string))
    }

    // ========================================================================
    // Year discovery
    // ========================================================================

    /// Years with quarterly archives on the portal, most recent first.
    ///
    /// Falls back to the last `fallback_years` calendar years when the index
    /// is unreachable or lists nothing.
    #[instrument(skip(self))]
    pub async fn list_available_years(&self, fallback_years: usize) -> Vec<i32> {
        let url = self.config.base_url(ReportFamily::Itr).to_string();
        let listed = match self.http.get_text(&url, self.config.index_timeout).await {
            Ok(html) => extract_years_from_html(&html, ReportFamily::Itr),
            Err(e) => Err(e),
        };

        match listed {
            Ok(years) if !years.is_empty() => {
                info!(?years, "Available years");
                years
            }
            Ok(_) => {
                warn!(fallback_years, "Year index lists no archives, using fallback years");
                fallback_year_list(fallback_years)
            }
            Err(e) => {
                warn!(fallback_years, error = %e, "Year index unavailable, using fallback years");
                fallback_year_list(fallback_years)
            }
        }
    }

    // ========================================================================
    // Yearly archives
    // ========================================================================

    /// Statements of one company from one yearly archive.
    ///
    /// # Errors
    /// [`CvmError::ReportNotFound`] when the archive does not exist, transport
    /// errors otherwise. A corrupted archive is not an error and yields an
    /// empty map.
    #[instrument(skip(self, family, tax_id, report_types), fields(family = %family))]
    pub async fn get_report_data(
        &self,
        family: ReportFamily,
        code: &str,
        tax_id: Option<&str>,
        year: i32,
        report_types: &[ReportType],
    ) -> Result<ReportData> {
        let key = family.archive_name(year);
        let url = self.config.archive_url(family, year);
        let bytes = self
            .download_cached(
                CacheNamespace::Archives,
                &key,
                &url,
                self.config.archive_ttl,
                self.config.archive_timeout,
            )
            .await
            .map_err(|e| match e {
                CvmError::HttpStatus { status: 404, .. } => CvmError::ReportNotFound { family, year },
                other => other,
            })?;

        let code = code.to_string();
        let tax_id = tax_id.map(str::to_string);
        let report_types = report_types.to_vec();
        let consolidated = self.config.consolidated;

        tokio::task::spawn_blocking(move || {
            let request = ArchiveRequest {
                family,
                year,
                company: CompanyKey {
                    code: &code,
                    tax_id: tax_id.as_deref(),
                },
                report_types: &report_types,
                consolidated,
            };
            parse_archive(&bytes, &request)
        })
        .await
        .map_err(|e| CvmError::Other(format!("Archive parse task failed: {e}")))
    }

    /// Quarterly statements of one company for `year`.
    ///
    /// # Errors
    /// [`CvmError::ReportNotFound`] when the year has no quarterly archive.
    pub async fn get_itr_data(&self, code: &str, tax_id: Option<&str>, year: i32) -> Result<ReportData> {
        let data = self
            .get_report_data(ReportFamily::Itr, code, tax_id, year, &self.config.report_types)
            .await?;
        if data.is_empty() {
            warn!(code, year, "No quarterly statements found for company");
        }
        Ok(data)
    }

    /// Annual statements of one company for `year`; empty when the year has
    /// no annual archive.
    ///
    /// # Errors
    /// Transport errors other than a missing archive.
    pub async fn get_dfp_data(&self, code: &str, tax_id: Option<&str>, year: i32) -> Result<ReportData> {
        match self
            .get_report_data(ReportFamily::Dfp, code, tax_id, year, &self.config.report_types)
            .await
        {
            Err(CvmError::ReportNotFound { .. }) => {
                debug!(code, year, "No annual archive for year");
                Ok(ReportData::new())
            }
            other => other,
        }
    }

    /// Both families for one year; failures are classified and logged, never
    /// raised.
    pub async fn fetch_year_data(&self, code: &str, tax_id: Option<&str>, year: i32) -> YearData {
        let mut outcome = YearData {
            year,
            ..YearData::default()
        };

        let results = [
            (ReportFamily::Itr, self.get_itr_data(code, tax_id, year).await),
            (ReportFamily::Dfp, self.get_dfp_data(code, tax_id, year).await),
        ];

        for (family, result) in results {
            match result {
                Ok(data) if data.is_empty() => {}
                Ok(data) => outcome.partials.push(data),
                Err(e) => match e.kind() {
                    ErrorKind::NotFound => info!(family = %family, year, reason = %e, "Report not available"),
                    ErrorKind::Transient => {
                        warn!(family = %family, year, error = %e, "Transient failure, dropping year");
                        outcome.transient_failure = Some(e);
                    }
                    ErrorKind::DataIntegrity | ErrorKind::Other => {
                        error!(family = %family, year, error = %e, "Failed to fetch statements");
                    }
                },
            }
        }
        outcome
    }

    /// Merges both families of every year in `years`, fetched by at most
    /// five concurrent workers.
    ///
    /// # Errors
    /// Only when every year failed transiently and nothing was collected; the
    /// last transient error is returned.
    #[instrument(skip(self, tax_id, years), fields(years = years.len()))]
    pub async fn fetch_historical(
        &self,
        code: &str,
        tax_id: Option<&str>,
        years: &[i32],
    ) -> Result<ConsolidatedDataset> {
        let workers = self.config.effective_concurrency().min(years.len().max(1));
        info!(code, ?years, workers, "Fetching historical statements");

        let mut dataset = ConsolidatedDataset::new();
        let mut failed_years = 0;
        let mut last_failure = None;

        let mut outcomes = stream::iter(years.iter().copied())
            .map(|year| self.fetch_year_data(code, tax_id, year))
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            if let Some(e) = outcome.transient_failure {
                if outcome.partials.is_empty() {
                    failed_years += 1;
                }
                last_failure = Some(e);
            }
            debug!(year = outcome.year, partials = outcome.partials.len(), "Year merged");
            for partial in outcome.partials {
                dataset.merge(partial);
            }
        }

        if dataset.is_empty() && !years.is_empty() && failed_years == years.len() {
            if let Some(e) = last_failure {
                error!(code, error = %e, "Every year failed");
                return Err(e);
            }
        }

        info!(code, rows = dataset.total_rows(), "Historical statements merged");
        Ok(dataset)
    }

    // ========================================================================
    // Company datasets
    // ========================================================================

    /// Every statement of the company behind `ticker` over the last
    /// `years_back` available years.
    ///
    /// # Errors
    /// [`CvmError::NotFound`] if `ticker` cannot be resolved, registry load
    /// failures, or the error of a fetch where every year failed.
    #[instrument(skip(self))]
    pub async fn get_consolidated_company_data(
        &self,
        ticker: &str,
        years_back: usize,
    ) -> Result<ConsolidatedDataset> {
        let registry = self.get_cadastral_data().await?;
        let code = registry
            .resolve(ticker)
            .await
            .ok_or_else(|| CvmError::NotFound(ticker.to_string()))?;

        let key = format_cache_key(ticker, &format!("financials_{years_back}y"));
        if let Some(dataset) = self.load_dataset(&key).await {
            info!(ticker, key = %key, "Dataset loaded from cache");
            return Ok(dataset);
        }

        info!(ticker, code = %code, years_back, "Building dataset");
        let tax_id = registry.tax_id(&code);
        let mut years = self.list_available_years(years_back).await;
        years.truncate(years_back);

        let dataset = self.fetch_historical(&code, tax_id, &years).await?;
        self.store_dataset(&key, &dataset).await;
        Ok(dataset)
    }

    async fn load_dataset(&self, key: &str) -> Option<ConsolidatedDataset> {
        let bytes = match self
            .cache
            .load(CacheNamespace::Datasets, key, self.config.dataset_ttl)
            .await
        {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(key, error = %e, "Dataset cache read failed");
                return None;
            }
        };
        serde_json::from_slice(&bytes)
            .inspect_err(|e| warn!(key, error = %e, "Discarding unreadable cached dataset"))
            .ok()
    }

    async fn store_dataset(&self, key: &str, dataset: &ConsolidatedDataset) {
        let bytes = match serde_json::to_vec(dataset) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize dataset");
                return;
            }
        };
        if let Err(e) = self.cache.store(CacheNamespace::Datasets, key, &bytes).await {
            warn!(key, error = %e, "Dataset cache write failed");
        }
    }

    /// Drops cached blobs older than their configured lifetime.
    ///
    /// # Errors
    /// Propagates cache backend failures.
    pub async fn prune_cache(&self) -> Result<usize> {
        let mut removed = 0;
        for (namespace, ttl) in [
            (CacheNamespace::Archives, self.config.archive_ttl),
            (CacheNamespace::Cadastral, self.config.cadastral_ttl),
            (CacheNamespace::Datasets, self.config.dataset_ttl),
        ] {
            removed += self.cache.invalidate_stale(namespace, ttl).await?;
        }
        info!(removed, "Cache pruned");
        Ok(removed)
    }
}

/// The current calendar year and the `count - 1` before it.
fn fallback_year_list(count: usize) -> Vec<i32> {
    let current = Local::now().year();
    (0..count)
        .map_while(|offset| i32::try_from(offset).ok())
        .map(|offset| current - offset)
        .collect()
}
