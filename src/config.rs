//! Service Configuration
//!
//! Loaded from an optional YAML file, then overridden by command-line flags
//! and environment variables.

use crate::api::RestConfig;
use crate::cache::storage;
use crate::cache::{CacheServiceConfig, CacheStoreConfig, CodecConfig, CompressionAlgorithm};
use crate::domain::KeyValueStoreRef;
use crate::error::{Error, Result};
use crate::upstream::{RetryPolicy, UpstreamClientConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

// =============================================================================
// Sections
// =============================================================================

/// Upstream reporting API settings
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpstreamSettings {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub inventory_path: String,
    pub timeout_seconds: u64,
    pub retry_backoff_millis: u64,
    pub max_attempts: u32,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: String::new(),
            inventory_path: "/api/v1/reports/inventory".to_string(),
            timeout_seconds: 30,
            retry_backoff_millis: 500,
            max_attempts: 2,
        }
    }
}

impl std::fmt::Debug for UpstreamSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSettings")
            .field("base_url", &self.base_url)
            .field("inventory_path", &self.inventory_path)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retry_backoff_millis", &self.retry_backoff_millis)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// Key-value store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSettings {
    /// `memory://`, `redis://…` or `rediss://…`
    pub connection_string: String,
    pub operation_timeout_millis: u64,
    /// Physical retention as a multiple of the envelope TTL
    pub retention_factor: u32,
    pub compression: CompressionAlgorithm,
    pub compression_min_bytes: usize,
    /// Prefix for every key written to Redis, for sharing one server
    pub key_namespace: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connection_string: "memory://".to_string(),
            operation_timeout_millis: 2000,
            retention_factor: 10,
            compression: CompressionAlgorithm::Lz4,
            compression_min_bytes: 1024,
            key_namespace: None,
        }
    }
}

/// Cache policy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    pub default_ttl_minutes: u64,
    pub min_ttl_minutes: u64,
    /// Threshold used by `lowStock=true` when the request gives none
    pub low_stock_threshold: u64,
    /// Background warm-up interval; 0 disables it
    pub refresh_interval_minutes: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 15,
            min_ttl_minutes: 1,
            low_stock_threshold: 5,
            refresh_interval_minutes: 0,
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiSettings {
    pub bind_addr: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8090".to_string(),
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    pub upstream: UpstreamSettings,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub api: ApiSettings,
}

/// Values given on the command line or in the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub upstream_api_key: Option<String>,
    pub upstream_api_secret: Option<String>,
    pub upstream_base_url: Option<String>,
    pub store_connection_string: Option<String>,
    pub default_ttl_minutes: Option<u64>,
    pub min_ttl_minutes: Option<u64>,
    pub api_addr: Option<String>,
}

impl ServiceConfig {
    /// Parse YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Load from `path` if given, otherwise start from defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line and environment overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.upstream_api_key {
            self.upstream.api_key = v;
        }
        if let Some(v) = overrides.upstream_api_secret {
            self.upstream.api_secret = v;
        }
        if let Some(v) = overrides.upstream_base_url {
            self.upstream.base_url = v;
        }
        if let Some(v) = overrides.store_connection_string {
            self.store.connection_string = v;
        }
        if let Some(v) = overrides.default_ttl_minutes {
            self.cache.default_ttl_minutes = v;
        }
        if let Some(v) = overrides.min_ttl_minutes {
            self.cache.min_ttl_minutes = v;
        }
        if let Some(v) = overrides.api_addr {
            self.api.bind_addr = v;
        }
    }

    /// Reject unusable settings; raise a default TTL below the minimum
    pub fn validate(&mut self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(Error::Configuration("upstream.baseUrl must be set".into()));
        }
        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(Error::Configuration(format!(
                "upstream.baseUrl must be an http(s) URL, got {}",
                self.upstream.base_url
            )));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(Error::Configuration("upstream.timeoutSeconds must be positive".into()));
        }
        if self.upstream.max_attempts == 0 {
            return Err(Error::Configuration("upstream.maxAttempts must be positive".into()));
        }
        if self.store.operation_timeout_millis == 0 {
            return Err(Error::Configuration(
                "store.operationTimeoutMillis must be positive".into(),
            ));
        }
        if self.cache.min_ttl_minutes == 0 {
            return Err(Error::Configuration("cache.minTtlMinutes must be positive".into()));
        }
        if self.cache.default_ttl_minutes < self.cache.min_ttl_minutes {
            warn!(
                default_ttl_minutes = self.cache.default_ttl_minutes,
                min_ttl_minutes = self.cache.min_ttl_minutes,
                "Default TTL below minimum, raising it"
            );
            self.cache.default_ttl_minutes = self.cache.min_ttl_minutes;
        }
        self.bind_addr()?;
        Ok(())
    }

    /// Parsed API bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.api.bind_addr.parse().map_err(|e| {
            Error::Configuration(format!("invalid api.bindAddr {}: {}", self.api.bind_addr, e))
        })
    }

    pub fn upstream_client_config(&self) -> UpstreamClientConfig {
        UpstreamClientConfig {
            base_url: self.upstream.base_url.clone(),
            inventory_path: self.upstream.inventory_path.clone(),
            api_key: self.upstream.api_key.clone(),
            api_secret: self.upstream.api_secret.clone(),
            timeout: Duration::from_secs(self.upstream.timeout_seconds),
            retry: RetryPolicy {
                max_attempts: self.upstream.max_attempts,
                backoff: Duration::from_millis(self.upstream.retry_backoff_millis),
            },
        }
    }

    /// Open the key-value backend named by `store.connectionString`
    pub fn store_backend(&self) -> Result<KeyValueStoreRef> {
        storage::from_connection_string(
            &self.store.connection_string,
            self.store.key_namespace.as_deref(),
        )
    }

    pub fn store_config(&self) -> CacheStoreConfig {
        CacheStoreConfig {
            operation_timeout: Duration::from_millis(self.store.operation_timeout_millis),
            retention_factor: self.store.retention_factor,
        }
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            algorithm: self.store.compression,
            min_size_bytes: self.store.compression_min_bytes,
            ..Default::default()
        }
    }

    pub fn cache_service_config(&self) -> CacheServiceConfig {
        CacheServiceConfig {
            default_ttl: minutes(self.cache.default_ttl_minutes),
            min_ttl: minutes(self.cache.min_ttl_minutes),
            ..Default::default()
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            low_stock_threshold: self.cache.low_stock_threshold,
        }
    }

    /// Background refresh interval, if enabled
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.cache.refresh_interval_minutes > 0).then(|| minutes(self.cache.refresh_interval_minutes))
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}
