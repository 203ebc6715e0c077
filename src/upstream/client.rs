//! Upstream Reporting API Client
//!
//! Authenticated HTTP access to the inventory report. The client carries a
//! hard request timeout and runs every fetch under its [`RetryPolicy`].

use crate::domain::UpstreamSource;
use crate::error::{Error, FetchError, Result};
use crate::inventory::{RawRecord, UpstreamPayload};
use crate::upstream::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the upstream client
#[derive(Clone)]
pub struct UpstreamClientConfig {
    /// Base URL of the reporting API
    pub base_url: String,
    /// Path of the inventory report, relative to `base_url`
    pub inventory_path: String,
    /// API key (basic-auth user)
    pub api_key: String,
    /// API secret (basic-auth password)
    pub api_secret: String,
    /// Hard per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            inventory_path: "/api/v1/reports/inventory".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for UpstreamClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClientConfig")
            .field("base_url", &self.base_url)
            .field("inventory_path", &self.inventory_path)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

// =============================================================================
// Upstream Client
// =============================================================================

/// HTTP adapter for the reporting API
#[derive(Debug)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamClientConfig,
    url: String,
}

impl UpstreamClient {
    /// Create a new client
    pub fn new(config: UpstreamClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.inventory_path.trim_start_matches('/')
        );

        info!(url = %url, timeout_secs = config.timeout.as_secs(), "Upstream client configured");

        Ok(Self { client, config, url })
    }

    /// Report URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self, attempt: u32) -> std::result::Result<Vec<RawRecord>, FetchError> {
        debug!(url = %self.url, attempt, "Requesting inventory report");

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.headers()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let payload: UpstreamPayload = serde_json::from_slice(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        Ok(payload.into_records())
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                after: self.config.timeout,
            }
        } else if error.is_decode() {
            FetchError::MalformedResponse(error.to_string())
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

fn status_error(status: StatusCode, headers: &HeaderMap) -> FetchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::AuthFailure {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            FetchError::Transport(format!("upstream returned HTTP {}", status.as_u16()))
        }
        s if s.is_server_error() => {
            FetchError::Transport(format!("upstream returned HTTP {}", s.as_u16()))
        }
        s => FetchError::MalformedResponse(format!("unexpected HTTP status {}", s.as_u16())),
    }
}

/// Parse a `Retry-After` header given in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && (0.0..=f64::from(u32::MAX)).contains(seconds))
        .map(Duration::from_secs_f64)
}

#[async_trait]
impl UpstreamSource for UpstreamClient {
    fn source_name(&self) -> &str {
        "reporting-api"
    }

    async fn fetch_all(&self) -> std::result::Result<Vec<RawRecord>, FetchError> {
        let result = self
            .config
            .retry
            .run(self.source_name(), |attempt| self.fetch_once(attempt))
            .await;

        match &result {
            Ok(records) => debug!(records = records.len(), "Inventory report received"),
            Err(e) => error!(kind = e.kind(), error = %e, "Inventory report fetch failed"),
        }
        result
    }
}
