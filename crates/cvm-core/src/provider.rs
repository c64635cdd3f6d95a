//! Traits for external collaborators.

use async_trait::async_trait;

use crate::error::Result;

/// Ticker-to-company-name hint service.
///
/// Used only to steer identity resolution; a `None` answer or an error
/// simply skips that resolution step.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Returns the service name (e.g., "yahoo").
    fn name(&self) -> &str;

    /// Looks up the company name behind a market ticker.
    async fn resolve_name(&self, ticker: &str) -> Result<Option<String>>;
}
