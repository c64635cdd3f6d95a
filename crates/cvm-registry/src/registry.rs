//! Company registry with a fallback resolution chain.

use std::sync::Arc;

use cvm_core::{CadastralRecord, NameResolver};
use tracing::{debug, info, warn};

use crate::matcher::{CompanyMatcher, ShortestNameMatcher};
use crate::normalize::{is_market_ticker, normalize_company_name, ticker_root};

/// In-memory view of the cadastral registry.
///
/// Resolution never fails: every lookup returns `None` when nothing matches.
///
/// # Example
///
/// ```rust,ignore
/// use cvm_registry::CompanyRegistry;
///
/// let registry = CompanyRegistry::new(records);
/// let code = registry.resolve("WEG S.A.").await; // Some("5410")
/// let tax_id = registry.tax_id("005410");        // Some("84.429.695/0001-11")
/// ```
pub struct CompanyRegistry {
    records: Vec<CadastralRecord>,
    matcher: Box<dyn CompanyMatcher>,
    name_hints: Option<Arc<dyn NameResolver>>,
}

impl std::fmt::Debug for CompanyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanyRegistry")
            .field("records", &self.records.len())
            .field("matcher", &self.matcher)
            .field("name_hints", &self.name_hints.as_ref().map(|h| h.name()))
            .finish()
    }
}

impl CompanyRegistry {
    /// Create a registry over cadastral records.
    #[must_use]
    pub fn new(records: Vec<CadastralRecord>) -> Self {
        Self {
            records,
            matcher: Box::new(ShortestNameMatcher),
            name_hints: None,
        }
    }

    /// Replace the name matching rule.
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl CompanyMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Set the ticker-to-name hint service.
    #[must_use]
    pub fn with_name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.name_hints = Some(resolver);
        self
    }

    /// Number of registered companies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the registry holds no companies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records.
    #[must_use]
    pub fn records(&self) -> &[CadastralRecord] {
        &self.records
    }

    /// Code of the company whose legal name matches `term`.
    #[must_use]
    pub fn find_code(&self, term: &str) -> Option<&str> {
        let index = self.matcher.find(&self.records, term)?;
        let record = &self.records[index];
        info!(
            name = %record.legal_name,
            code = %record.code,
            term,
            "Company identified"
        );
        Some(record.code.as_str())
    }

    /// Resolves a free-form identifier to a regulator code.
    ///
    /// Tried in order, first hit wins:
    /// 1. the identifier as a name fragment;
    /// 2. the company name behind the identifier as a market ticker;
    /// 3. the normalized identifier, if normalization changed it;
    /// 4. the first four letters of a ticker-like identifier.
    pub async fn resolve(&self, identifier: &str) -> Option<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }

        if let Some(code) = self.find_code(identifier) {
            return Some(code.to_string());
        }

        if let Some(name) = self.ticker_hint(identifier).await {
            if let Some(code) = self.find_code(&name) {
                return Some(code.to_string());
            }
        }

        let normalized = normalize_company_name(identifier);
        if normalized != identifier && normalized.chars().count() >= 2 {
            if let Some(code) = self.find_code(&normalized) {
                return Some(code.to_string());
            }
        }

        if let Some(root) = ticker_root(identifier) {
            if let Some(code) = self.find_code(root) {
                return Some(code.to_string());
            }
        }

        debug!(identifier, "Identifier not found in registry");
        None
    }

    async fn ticker_hint(&self, identifier: &str) -> Option<String> {
        let resolver = self.name_hints.as_ref()?;
        if !is_market_ticker(identifier) {
            return None;
        }

        let ticker = identifier.to_uppercase();
        match resolver.resolve_name(&ticker).await {
            Ok(Some(name)) => {
                let normalized = normalize_company_name(&name);
                debug!(ticker = %ticker, name = %name, normalized = %normalized, "Ticker name hint");
                (!normalized.is_empty()).then_some(normalized)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(ticker = %ticker, provider = resolver.name(), error = %e, "Ticker name hint failed");
                None
            }
        }
    }

    /// Record registered under `code`, matched as given or zero-padded to six
    /// digits.
    #[must_use]
    pub fn profile(&self, code: &str) -> Option<&CadastralRecord> {
        let Ok(number) = code.trim().parse::<u64>() else {
            warn!(code, "Invalid CVM code");
            return None;
        };
        let target = number.to_string();
        self.records
            .iter()
            .find(|r| r.code.trim() == target)
            .or_else(|| {
                let padded = format!("{number:06}");
                self.records
                    .iter()
                    .find(|r| format!("{:0>6}", r.code.trim()) == padded)
            })
    }

    /// Tax id of the company registered under `code`.
    #[must_use]
    pub fn tax_id(&self, code: &str) -> Option<&str> {
        self.profile(code)
            .map(|r| r.tax_id.as_str())
            .filter(|t| !t.is_empty())
    }
}
