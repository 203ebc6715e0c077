//! Cache Entry Types
//!
//! Defines cache keys, envelopes and the freshness tag carried by every
//! served payload.

use crate::inventory::InventoryRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Prefix shared by every key this service owns
pub const KEY_PREFIX: &str = "inventory";

/// Upper bound on a TTL; keeps deadline arithmetic in range
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

// =============================================================================
// Cache Key
// =============================================================================

/// Logical view stored as one envelope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// Full inventory snapshot (`inventory:all`)
    All,
    /// Records of a single vendor (`inventory:vendor:<name>`)
    Vendor(String),
}

impl CacheKey {
    /// Create a vendor key
    pub fn vendor(name: impl Into<String>) -> Self {
        CacheKey::Vendor(name.into())
    }

    /// Get a string representation for storage
    pub fn to_storage_key(&self) -> String {
        match self {
            CacheKey::All => format!("{}:all", KEY_PREFIX),
            CacheKey::Vendor(name) => format!("{}:vendor:{}", KEY_PREFIX, name),
        }
    }

    /// Whether a record belongs to this view
    pub fn admits(&self, record: &InventoryRecord) -> bool {
        match self {
            CacheKey::All => true,
            CacheKey::Vendor(name) => record.vendor.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_storage_key())
    }
}

// =============================================================================
// Source State
// =============================================================================

/// How the served payload relates to the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceState {
    /// Within its TTL, or fetched by this request
    #[default]
    Fresh,
    /// Expired data served because a refresh failed
    StaleFallback,
}

impl SourceState {
    pub fn is_fresh(&self) -> bool {
        matches!(self, SourceState::Fresh)
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceState::Fresh => write!(f, "fresh"),
            SourceState::StaleFallback => write!(f, "stale-fallback"),
        }
    }
}

// =============================================================================
// Cache Envelope
// =============================================================================

/// What the store actually holds for a key.
///
/// Immutable once built; a refresh replaces the whole envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub key: CacheKey,
    pub payload: Arc<Vec<InventoryRecord>>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub source_state: SourceState,
}

impl CacheEnvelope {
    /// Build a fresh envelope for a just-completed fetch
    pub fn fresh(
        key: CacheKey,
        payload: Vec<InventoryRecord>,
        fetched_at: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            key,
            payload: Arc::new(payload),
            fetched_at,
            ttl_seconds: ttl_seconds.max(1),
            source_state: SourceState::Fresh,
        }
    }

    /// Freshness deadline (`fetchedAt + ttlSeconds`)
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + Duration::seconds(self.ttl_seconds.min(MAX_TTL_SECONDS) as i64)
    }

    /// Check whether the envelope is within its TTL at `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Whole seconds elapsed since the fetch, never negative
    pub fn age_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.fetched_at).num_seconds().max(0) as u64
    }

    /// Copy of this envelope tagged as a stale fallback.
    /// The payload is shared, not cloned.
    pub fn as_stale_fallback(&self) -> Self {
        Self {
            source_state: SourceState::StaleFallback,
            ..self.clone()
        }
    }

    pub fn record_count(&self) -> usize {
        self.payload.len()
    }
}
