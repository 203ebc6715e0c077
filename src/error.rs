//! Error types for the Inventory Cache
//!
//! Provides structured error types for the cache store, the upstream
//! reporting API, the orchestrator and the HTTP surface.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Upstream Fetch Errors
// =============================================================================

/// Failure of a single upstream fetch attempt.
///
/// Cloneable so that one in-flight fetch can hand the same outcome to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Upstream request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("Upstream rejected credentials (HTTP {status})")]
    AuthFailure { status: u16 },

    #[error("Upstream returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upstream rate limit exceeded{}", .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Upstream fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Check if a retry may succeed where this attempt failed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Transport(_))
    }

    /// Stable label used in logs, metrics and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "upstream_timeout",
            FetchError::AuthFailure { .. } => "upstream_auth_failure",
            FetchError::MalformedResponse(_) => "upstream_malformed",
            FetchError::RateLimited { .. } => "upstream_rate_limited",
            FetchError::Transport(_) => "upstream_transport",
            FetchError::Aborted(_) => "upstream_aborted",
        }
    }
}

// =============================================================================
// Service Errors
// =============================================================================

/// Unified error type for the service
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Cache Store Errors
    // =========================================================================
    #[error("Cache store unavailable during {operation}: {reason}")]
    StoreUnavailable { operation: &'static str, reason: String },

    #[error("Envelope codec error: {0}")]
    Codec(String),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error("No inventory data available for {key}: {cause}")]
    NoDataAvailable { key: String, cause: FetchError },

    // =========================================================================
    // API Errors
    // =========================================================================
    #[error("API request validation failed: {0}")]
    ApiValidation(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Build a store error for the named operation
    pub fn store(operation: &'static str, reason: impl ToString) -> Self {
        Error::StoreUnavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Stable snake_case label for this error
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal_error",
            Error::Configuration(_) => "configuration_error",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::Codec(_) => "codec_error",
            Error::Upstream(e) => e.kind(),
            Error::NoDataAvailable { .. } => "no_data_available",
            Error::ApiValidation(_) => "invalid_request",
            Error::JsonParse(_) => "json_parse_error",
            Error::YamlParse(_) => "yaml_parse_error",
        }
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Error::StoreUnavailable { .. } => true,
            Error::Upstream(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, Error>;
