//! REST API Handlers
//!
//! Implements the inventory read endpoint and the cache administration
//! endpoint.

use crate::cache::{FetchMetricsSnapshot, GetOptions, InventoryCacheRef};
use crate::error::Error;
use crate::inventory::{InventoryFilter, InventoryQuery};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters of `GET /inventory`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryParams {
    #[serde(default)]
    pub force_refresh: Option<bool>,
    /// TTL in minutes for a refreshed envelope
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub low_stock: Option<bool>,
    /// Overrides the configured low-stock threshold
    #[serde(default)]
    pub threshold: Option<u64>,
}

impl InventoryParams {
    fn options(&self) -> GetOptions {
        GetOptions {
            ttl: self.ttl.map(|m| Duration::from_secs(m.saturating_mul(60))),
            force_refresh: self.force_refresh.unwrap_or(false),
        }
    }

    fn filter(&self, default_threshold: u64) -> InventoryFilter {
        let low_stock_threshold = match (self.low_stock, self.threshold) {
            (Some(true), threshold) => Some(threshold.unwrap_or(default_threshold)),
            _ => None,
        };

        InventoryFilter {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            vendor: self.vendor.clone().filter(|v| !v.is_empty()),
            low_stock_threshold,
        }
    }
}

/// Cache administration actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheAction {
    ClearCache,
    WarmUpCache,
    HealthCheck,
}

/// Body of `POST /inventory/cache`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheActionRequest {
    pub action: CacheAction,
}

/// Response to `warmUpCache`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmUpResponse {
    pub metrics: FetchMetricsSnapshot,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Map a service error onto an HTTP response
fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::NoDataAvailable { .. } | Error::StoreUnavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        Error::ApiValidation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let details = match err {
        Error::NoDataAvailable { cause, .. } => Some(cause.kind().to_string()),
        _ => None,
    };

    (
        status,
        Json(ApiErrorResponse {
            error: err.kind().into(),
            message: err.to_string(),
            details,
        }),
    )
        .into_response()
}

// =============================================================================
// REST Router
// =============================================================================

/// REST settings not owned by the cache
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Threshold used by `lowStock=true` without `threshold`
    pub low_stock_threshold: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
        }
    }
}

/// REST API router builder
pub struct RestRouter {
    cache: InventoryCacheRef,
    config: RestConfig,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(cache: InventoryCacheRef, config: RestConfig) -> Self {
        Self { cache, config }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            query: InventoryQuery::new(self.cache.clone()),
            cache: self.cache,
            low_stock_threshold: self.config.low_stock_threshold,
        };

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(Any);

        Router::new()
            // Inventory endpoints
            .route("/inventory", get(get_inventory))
            .route("/inventory/cache", post(cache_action))
            // Health endpoints
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    cache: InventoryCacheRef,
    query: InventoryQuery,
    low_stock_threshold: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve inventory, optionally filtered
async fn get_inventory(
    State(state): State<AppState>,
    params: std::result::Result<Query<InventoryParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return error_response(&Error::ApiValidation(rejection.body_text())),
    };

    let filter = params.filter(state.low_stock_threshold);
    debug!(?filter, force_refresh = ?params.force_refresh, "Inventory query");

    match state.query.query(&filter, params.options()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            warn!(error = %e, "Inventory query failed");
            error_response(&e)
        }
    }
}

/// Run a cache administration action
async fn cache_action(
    State(state): State<AppState>,
    request: std::result::Result<Json<CacheActionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(&Error::ApiValidation(rejection.body_text())),
    };

    info!(action = ?request.action, "Cache action requested");

    match request.action {
        CacheAction::ClearCache => match state.cache.clear_cache().await {
            Ok(report) => (StatusCode::OK, Json(report)).into_response(),
            Err(e) => error_response(&e),
        },
        CacheAction::WarmUpCache => match state.cache.warm_up().await {
            Ok(_) => (
                StatusCode::OK,
                Json(WarmUpResponse {
                    metrics: state.cache.metrics_snapshot(),
                }),
            )
                .into_response(),
            Err(e) => error_response(&e),
        },
        CacheAction::HealthCheck => {
            (StatusCode::OK, Json(state.cache.health_check().await)).into_response()
        }
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.cache.health_check().await;
    if report.is_serving() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "cache store and upstream both down")
    }
}
