//! Retrying HTTP transport.
//!
//! Every request goes through a shared rate limiter and is retried with
//! exponential backoff on connection failures and on the statuses the portal
//! returns when overloaded. Failures are mapped onto [`CvmError`] so callers
//! can branch on [`CvmError::kind`].

use std::sync::Arc;
use std::time::Duration;

use cvm_core::{CvmError, Result};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use crate::config::CvmConfig;

/// Statuses worth another attempt.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Spaces out request starts.
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_request: now.checked_sub(min_interval).unwrap_or(now),
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// HTTP transport shared by every portal call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    retries: u32,
    backoff_base: Duration,
}

impl HttpTransport {
    /// Build a transport from the client configuration.
    ///
    /// # Errors
    /// Returns [`CvmError::Other`] if the HTTP client cannot be built.
    pub fn new(config: &CvmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CvmError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Build a transport around a pre-configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &CvmConfig) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.min_request_interval))),
            retries: config.retries,
            backoff_base: config.backoff_base,
        }
    }

    /// GET `url` and return the body.
    ///
    /// # Errors
    /// [`CvmError::HttpStatus`] for a non-success final status,
    /// [`CvmError::Timeout`] when the deadline passes, [`CvmError::Network`]
    /// for connection and body read failures.
    pub async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.try_get(url, timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                    warn!(url, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Retrying request");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// GET `url` and decode the body as lossy UTF-8.
    ///
    /// # Errors
    /// See [`HttpTransport::get_bytes`].
    pub async fn get_text(&self, url: &str, timeout: Duration) -> Result<String> {
        let bytes = self.get_bytes(url, timeout).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn try_get(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.rate_limiter.lock().await.wait().await;
        trace!(url, timeout_secs = timeout.as_secs(), "GET");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Request failed");
            return Err(CvmError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(url, &e))?;
        debug!(url, bytes = body.len(), "Downloaded");
        Ok(body.to_vec())
    }
}

fn map_reqwest_error(url: &str, e: &reqwest::Error) -> CvmError {
    if e.is_timeout() {
        CvmError::Timeout(format!("{url}: {e}"))
    } else {
        CvmError::Network(format!("{url}: {e}"))
    }
}

fn is_retryable(e: &CvmError) -> bool {
    match e {
        CvmError::HttpStatus { status, .. } => RETRY_STATUSES.contains(status),
        CvmError::Network(_) => true,
        _ => false,
    }
}
