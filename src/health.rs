//! Health Classification
//!
//! Turns the store's recent operation outcomes and the fetch history into
//! the cache and upstream states reported by health checks.

use crate::cache::metrics::{FetchMetricsSnapshot, StoreWindowSnapshot, STORE_WINDOW};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Multiple of the default TTL after which a failing upstream counts as down
pub const UPSTREAM_DOWN_TTL_FACTOR: u32 = 10;

// =============================================================================
// Component State
// =============================================================================

/// Health of one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Healthy,
    Degraded,
    Down,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Healthy => write!(f, "healthy"),
            ComponentState::Degraded => write!(f, "degraded"),
            ComponentState::Down => write!(f, "down"),
        }
    }
}

// =============================================================================
// Health Report
// =============================================================================

/// Result of a health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub cache_state: ComponentState,
    pub upstream_state: ComponentState,
    pub metrics: FetchMetricsSnapshot,
    /// Seconds since the last successful fetch; `None` if there has been none
    pub cache_age_seconds: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Check if both components are healthy
    pub fn is_healthy(&self) -> bool {
        self.cache_state == ComponentState::Healthy
            && self.upstream_state == ComponentState::Healthy
    }

    /// The service can still answer queries from at least one side
    pub fn is_serving(&self) -> bool {
        self.cache_state != ComponentState::Down || self.upstream_state != ComponentState::Down
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Cache state from the last store operations
pub fn classify_cache(window: StoreWindowSnapshot) -> ComponentState {
    if window.recorded >= STORE_WINDOW && window.failed >= STORE_WINDOW {
        ComponentState::Down
    } else if window.failed > 0 {
        ComponentState::Degraded
    } else {
        ComponentState::Healthy
    }
}

/// Upstream state from the fetch history
pub fn classify_upstream(
    metrics: &FetchMetricsSnapshot,
    default_ttl: Duration,
    now: DateTime<Utc>,
) -> ComponentState {
    if metrics.last_fetch_error.is_none() {
        return ComponentState::Healthy;
    }

    let Some(last_fetch_at) = metrics.last_fetch_at else {
        return ComponentState::Down;
    };

    let limit = default_ttl
        .saturating_mul(UPSTREAM_DOWN_TTL_FACTOR)
        .as_secs()
        .min(i64::MAX as u64) as i64;
    if (now - last_fetch_at).num_seconds() > limit {
        ComponentState::Down
    } else {
        ComponentState::Degraded
    }
}

/// Build a full health report
pub fn assess(
    window: StoreWindowSnapshot,
    metrics: FetchMetricsSnapshot,
    default_ttl: Duration,
    now: DateTime<Utc>,
) -> HealthReport {
    let cache_age_seconds = metrics
        .last_fetch_at
        .map(|at| (now - at).num_seconds().max(0) as u64);

    HealthReport {
        cache_state: classify_cache(window),
        upstream_state: classify_upstream(&metrics, default_ttl, now),
        metrics,
        cache_age_seconds,
        checked_at: now,
    }
}
