//! Inventory Cache Gateway
//!
//! Serves inventory from a key-value cache in front of the slow upstream
//! reporting API.
//!
//! # Processes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                            inventory-cache                                   │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │   REST API      │  │ Metrics/Health  │  │   Background Refresh        │  │
//! │  │   (axum)        │  │ (hyper)         │  │   (optional)                │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           └────────────────────┼─────────────────────────┘                   │
//! │                    ┌───────────┴───────────┐                                │
//! │                    │     Cache Service     │                                │
//! │                    └───────────────────────┘                                │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use inventory_cache::cache::{CacheEvent, CacheService, CacheStore, EnvelopeCodec};
use inventory_cache::{
    ApiServer, ApiServerConfig, ConfigOverrides, Error, InventoryCache, InventoryCacheRef, Result,
    ServiceConfig, UpstreamClient,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Inventory Cache Gateway - cache-first access to the inventory reporting API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Upstream API key
    #[arg(long, env = "UPSTREAM_API_KEY", hide_env_values = true)]
    upstream_api_key: Option<String>,

    /// Upstream API secret
    #[arg(long, env = "UPSTREAM_API_SECRET", hide_env_values = true)]
    upstream_api_secret: Option<String>,

    /// Upstream base URL
    #[arg(long, env = "UPSTREAM_BASE_URL")]
    upstream_base_url: Option<String>,

    /// Cache store connection string (memory:// or redis://host:port)
    #[arg(long, env = "STORE_CONNECTION_STRING")]
    store_connection_string: Option<String>,

    /// Default TTL in minutes
    #[arg(long, env = "CACHE_DEFAULT_TTL_MINUTES")]
    default_ttl_minutes: Option<u64>,

    /// Minimum TTL in minutes
    #[arg(long, env = "CACHE_MIN_TTL_MINUTES")]
    min_ttl_minutes: Option<u64>,

    /// REST API bind address
    #[arg(long, env = "API_ADDR")]
    api_addr: Option<String>,

    /// Metrics and probe server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            upstream_api_key: self.upstream_api_key.clone(),
            upstream_api_secret: self.upstream_api_secret.clone(),
            upstream_base_url: self.upstream_base_url.clone(),
            store_connection_string: self.store_connection_string.clone(),
            default_ttl_minutes: self.default_ttl_minutes,
            min_ttl_minutes: self.min_ttl_minutes,
            api_addr: self.api_addr.clone(),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Inventory Cache Gateway");
    info!("  Version: {}", inventory_cache::VERSION);

    let mut config = ServiceConfig::load_or_default(args.config.as_deref())?;
    config.apply(args.overrides());
    config.validate()?;

    info!("  Upstream: {}", config.upstream.base_url);
    info!("  REST API: {}", config.api.bind_addr);
    info!("  Metrics: {}", args.metrics_addr);

    // Cache store
    let backend = config.store_backend()?;
    let store = CacheStore::new(
        backend,
        EnvelopeCodec::new(config.codec_config()),
        config.store_config(),
    );

    // Upstream
    let upstream = Arc::new(UpstreamClient::new(config.upstream_client_config())?);

    let service = CacheService::new(store, upstream, config.cache_service_config());
    spawn_event_logger(&service);

    let cache: InventoryCacheRef = service;
    let cancel = CancellationToken::new();

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_cache = cache.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_cache).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Start background refresh
    if let Some(interval) = config.refresh_interval() {
        tokio::spawn(run_refresh_loop(cache.clone(), interval, cancel.clone()));
    }

    let api_config = ApiServerConfig {
        rest_addr: config.bind_addr()?,
        rest: config.rest_config(),
    };
    let api_server = ApiServer::new(api_config, cache.clone());

    let shutdown = api_server.shutdown_handle();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown_cancel.cancel();
        let _ = shutdown.send(());
    });

    info!("Starting inventory API server");
    let result = api_server.run().await;
    cancel.cancel();

    info!("Gateway shutdown complete");
    result
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "axum=info", "redis=info", "reqwest=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Background Tasks
// =============================================================================

fn spawn_event_logger(service: &CacheService) {
    let mut events = service.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event @ CacheEvent::FetchFailed { .. })
                | Ok(event @ CacheEvent::StoreUnavailable { .. }) => {
                    warn!(?event, "Cache event");
                }
                Ok(event) => debug!(?event, "Cache event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cache event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn run_refresh_loop(cache: InventoryCacheRef, interval: Duration, cancel: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Background refresh enabled");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Background refresh stopped");
                return;
            }
            _ = ticker.tick() => {
                match cache.warm_up().await {
                    Ok(snapshot) => info!(
                        records = snapshot.count(),
                        source_state = %snapshot.source_state,
                        "Background refresh complete"
                    ),
                    Err(e) => warn!(error = %e, "Background refresh failed"),
                }
            }
        }
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

/// Prometheus gauges sampled from the fetch metrics on every scrape.
///
/// Gauges rather than counters: `clearCache` resets the underlying values.
struct ExportedMetrics {
    hits: prometheus::IntGauge,
    misses: prometheus::IntGauge,
    api_calls: prometheus::IntGauge,
    store_failures: prometheus::IntGauge,
    stale_served: prometheus::IntGauge,
    last_fetch_timestamp: prometheus::IntGauge,
}

impl ExportedMetrics {
    fn register() -> std::result::Result<Self, prometheus::Error> {
        Ok(Self {
            hits: prometheus::register_int_gauge!(
                "inventory_cache_hits",
                "Requests served from a fresh cache envelope"
            )?,
            misses: prometheus::register_int_gauge!(
                "inventory_cache_misses",
                "Requests that found no fresh envelope"
            )?,
            api_calls: prometheus::register_int_gauge!(
                "inventory_cache_api_calls",
                "Upstream fetches started"
            )?,
            store_failures: prometheus::register_int_gauge!(
                "inventory_cache_store_failures",
                "Failed cache store operations"
            )?,
            stale_served: prometheus::register_int_gauge!(
                "inventory_cache_stale_served",
                "Responses served from stale fallback"
            )?,
            last_fetch_timestamp: prometheus::register_int_gauge!(
                "inventory_cache_last_fetch_timestamp",
                "Unix time of the last successful upstream fetch"
            )?,
        })
    }

    fn sample(&self, cache: &dyn InventoryCache) {
        let snapshot = cache.metrics_snapshot();
        self.hits.set(saturate(snapshot.cache_hits));
        self.misses.set(saturate(snapshot.cache_misses));
        self.api_calls.set(saturate(snapshot.api_calls));
        self.store_failures.set(saturate(snapshot.store_failures));
        self.stale_served.set(saturate(snapshot.stale_served));
        self.last_fetch_timestamp
            .set(snapshot.last_fetch_at.map_or(0, |at| at.timestamp()));
    }
}

fn saturate(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

async fn run_metrics_server(addr: &str, cache: InventoryCacheRef) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let exported = Arc::new(
        ExportedMetrics::register()
            .map_err(|e| Error::Internal(format!("Failed to register metrics: {}", e)))?,
    );

    let make_svc = make_service_fn(move |_conn| {
        let cache = cache.clone();
        let exported = exported.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let cache = cache.clone();
                let exported = exported.clone();
                async move {
                    let path = req.uri().path().to_string();
                    let (status, content_type, body) = match path.as_str() {
                        "/metrics" => {
                            exported.sample(&*cache);
                            let encoder = TextEncoder::new();
                            let mut buffer = Vec::new();
                            match encoder.encode(&prometheus::gather(), &mut buffer) {
                                Ok(()) => (StatusCode::OK, encoder.format_type().to_string(), buffer),
                                Err(e) => (
                                    StatusCode::INTERNAL_SERVER_ERROR,
                                    "text/plain".to_string(),
                                    e.to_string().into_bytes(),
                                ),
                            }
                        }
                        "/healthz" | "/livez" => {
                            (StatusCode::OK, "text/plain".to_string(), b"ok".to_vec())
                        }
                        "/readyz" => {
                            if cache.health_check().await.is_serving() {
                                (StatusCode::OK, "text/plain".to_string(), b"ok".to_vec())
                            } else {
                                (
                                    StatusCode::SERVICE_UNAVAILABLE,
                                    "text/plain".to_string(),
                                    b"unavailable".to_vec(),
                                )
                            }
                        }
                        _ => (StatusCode::NOT_FOUND, "text/plain".to_string(), b"not found".to_vec()),
                    };

                    let mut response = Response::new(Body::from(body));
                    *response.status_mut() = status;
                    if let Ok(value) = hyper::header::HeaderValue::from_str(&content_type) {
                        response.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
                    }
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::try_bind(&addr)
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exported_gauge_names() {
        let exported = ExportedMetrics::register().unwrap();
        exported.hits.set(3);

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .filter(|name| name.starts_with("inventory_cache_"))
            .collect();

        for expected in [
            "inventory_cache_hits",
            "inventory_cache_misses",
            "inventory_cache_api_calls",
            "inventory_cache_store_failures",
            "inventory_cache_stale_served",
            "inventory_cache_last_fetch_timestamp",
        ] {
            assert!(names.iter().any(|name| name == expected), "{} missing", expected);
        }
        assert!(names.iter().all(|name| !name.ends_with("_total")));
    }
}
