//! One entry point over resolution, retrieval and account mapping.

use std::sync::Arc;

use chrono::NaiveDate;
use cvm_core::{CadastralRecord, ConsolidatedDataset, CvmError, Result};
use cvm_mapper::{AccountMapper, AuditOpinion, FinancialSummary, GrowthRates, KeyMetrics};
use cvm_portal::{CvmClient, CvmConfig};
use tracing::{debug, info};

/// Registration data of a company together with its latest audit report.
#[derive(Clone, Debug, PartialEq)]
pub struct CompanyProfile {
    /// Cadastral registration.
    pub record: CadastralRecord,
    /// Latest audit report found in the filings.
    pub audit: Option<AuditOpinion>,
}

impl CompanyProfile {
    /// Audit firm named in the latest report, else the registered auditor.
    #[must_use]
    pub fn auditor(&self) -> Option<&str> {
        self.audit
            .as_ref()
            .and_then(|a| a.auditor.as_deref())
            .or(self.record.auditor.as_deref())
    }
}

/// Company resolution, filings retrieval and standardized figures.
///
/// # Example
///
/// ```rust,no_run
/// use cvm::{CvmConfig, CvmService};
///
/// # async fn run() -> cvm::Result<()> {
/// let service = CvmService::new(CvmConfig::default())?;
/// let metrics = service.key_metrics("WEGE3", 3, Some(38.5)).await?;
/// println!("P/E: {:?}", metrics.pe_ratio);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CvmService {
    client: Arc<CvmClient>,
}

impl CvmService {
    /// Service over a filesystem-cached client; ticker name hints come
    /// from Yahoo Finance when the `yahoo` feature is enabled.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CvmConfig) -> Result<Self> {
        let client = CvmClient::new(config)?;
        #[cfg(feature = "yahoo")]
        let client = client.with_name_resolver(Arc::new(cvm_yahoo::YahooNameResolver::new()));
        Ok(Self::from_client(client))
    }

    /// Service over an existing client.
    #[must_use]
    pub fn from_client(client: CvmClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Underlying portal client.
    #[must_use]
    pub fn client(&self) -> &CvmClient {
        &self.client
    }

    /// Regulator code behind a ticker or company name.
    ///
    /// # Errors
    /// Fails only when the cadastral registry cannot be loaded.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<String>> {
        self.client.resolve(identifier).await
    }

    /// Tax id registered under a regulator code.
    ///
    /// # Errors
    /// Fails only when the cadastral registry cannot be loaded.
    pub async fn get_tax_id(&self, code: &str) -> Result<Option<String>> {
        self.client.get_tax_id(code).await
    }

    /// Years with quarterly filings, most recent first.
    pub async fn list_available_years(&self, fallback_years: usize) -> Vec<i32> {
        self.client.list_available_years(fallback_years).await
    }

    /// Every statement of a company over the last `years_back` years.
    ///
    /// # Errors
    /// [`CvmError::NotFound`] for an unknown ticker; see
    /// [`CvmClient::get_consolidated_company_data`].
    pub async fn consolidated(&self, ticker: &str, years_back: usize) -> Result<ConsolidatedDataset> {
        self.client.get_consolidated_company_data(ticker, years_back).await
    }

    /// A [`FinancialSummary`] per comparison period: LTM and the two
    /// previous fiscal years.
    ///
    /// # Errors
    /// See [`CvmService::consolidated`].
    pub async fn summaries(&self, ticker: &str, years_back: usize) -> Result<Vec<FinancialSummary>> {
        let dataset = self.consolidated(ticker, years_back).await?;
        let mapper = AccountMapper::new(&dataset);
        let summaries: Vec<_> = mapper
            .get_comparison_dates()
            .iter()
            .map(|period| FinancialSummary::from_mapper(&mapper, period))
            .collect();
        debug!(ticker, periods = summaries.len(), "Summaries computed");
        Ok(summaries)
    }

    /// Ratios at the latest date; valuation ratios need `price`.
    ///
    /// # Errors
    /// See [`CvmService::consolidated`].
    pub async fn key_metrics(&self, ticker: &str, years_back: usize, price: Option<f64>) -> Result<KeyMetrics> {
        let dataset = self.consolidated(ticker, years_back).await?;
        Ok(KeyMetrics::compute(&AccountMapper::new(&dataset), None, price))
    }

    /// Revenue and net income growth over the fetched history.
    ///
    /// # Errors
    /// See [`CvmService::consolidated`].
    pub async fn growth(&self, ticker: &str, years_back: usize) -> Result<Option<GrowthRates>> {
        let dataset = self.consolidated(ticker, years_back).await?;
        Ok(GrowthRates::from_mapper(&AccountMapper::new(&dataset)))
    }

    /// Revenue, EBIT and net income year-to-date at every income statement
    /// date, oldest first.
    ///
    /// # Errors
    /// See [`CvmService::consolidated`].
    pub async fn evolution(&self, ticker: &str, years_back: usize) -> Result<Vec<(NaiveDate, [f64; 3])>> {
        let dataset = self.consolidated(ticker, years_back).await?;
        let mapper = AccountMapper::new(&dataset);
        let series = |account: cvm_mapper::Account| {
            mapper.evolution(account.report_type, account.code, account.description)
        };

        let revenue = series(cvm_mapper::accounts::REVENUE);
        let ebit = series(cvm_mapper::accounts::EBIT);
        let net_income = series(cvm_mapper::accounts::NET_INCOME);
        Ok(revenue
            .into_iter()
            .zip(ebit)
            .zip(net_income)
            .map(|(((date, revenue), (_, ebit)), (_, net_income))| (date, [revenue, ebit, net_income]))
            .collect())
    }

    /// Cadastral record and latest audit report of a company.
    ///
    /// # Errors
    /// [`CvmError::NotFound`] for an unknown ticker, registry load failures.
    pub async fn profile(&self, ticker: &str, years_back: usize) -> Result<CompanyProfile> {
        let registry = self.client.get_cadastral_data().await?;
        let code = registry
            .resolve(ticker)
            .await
            .ok_or_else(|| CvmError::NotFound(ticker.to_string()))?;
        let record = registry
            .profile(&code)
            .cloned()
            .ok_or_else(|| CvmError::NotFound(code.clone()))?;

        let audit = match self.consolidated(ticker, years_back).await {
            Ok(dataset) => AccountMapper::new(&dataset).audit_opinion(),
            Err(e) if e.is_transient() => {
                info!(ticker, error = %e, "Filings unavailable, profile without audit report");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(CompanyProfile { record, audit })
    }
}
