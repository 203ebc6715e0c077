//! Cache-First Inventory Cache
//!
//! Fronts the slow upstream reporting API with a key-value store:
//! - **Store adapter**: typed, time-bounded envelope operations
//! - **Single flight**: at most one upstream fetch per key in flight
//! - **Stale fallback**: expired data served, tagged, when a refresh fails
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Cache Service                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │   get_inventory(key)                                                     │
//! │        │                                                                 │
//! │        ▼            fresh                                                │
//! │  ┌──────────────┐ ───────▶ serve (sourceState = fresh)                   │
//! │  │ Cache Store  │                                                        │
//! │  │ (memory or   │ stale / cold / store error                             │
//! │  │  redis)      │ ──────────────┐                                        │
//! │  └──────────────┘               ▼                                        │
//! │         ▲               ┌──────────────┐      ┌──────────────────────┐   │
//! │         │  write        │ Flight Group │ ───▶ │ Upstream + Transform │   │
//! │         └────────────── │ (per key)    │      └──────────────────────┘   │
//! │                         └──────────────┘                                 │
//! │                                │ failure                                 │
//! │                                ▼                                         │
//! │                 stale envelope (sourceState = stale-fallback)            │
//! │                 or NoDataAvailable                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use inventory_cache::cache::{CacheKey, CacheService, CacheServiceConfig, CacheStore, GetOptions, InventoryCache};
//!
//! let store = CacheStore::with_backend(storage::from_connection_string("memory://", None)?);
//! let service = CacheService::new(store, upstream, CacheServiceConfig::default());
//!
//! let snapshot = service.get_inventory(&CacheKey::All, GetOptions::default()).await?;
//! if !snapshot.source_state.is_fresh() {
//!     println!("data may be outdated ({}s old)", snapshot.cache_age_seconds);
//! }
//! ```

pub mod codec;
pub mod entry;
pub mod events;
pub mod flight;
pub mod manager;
pub mod metrics;
pub mod storage;
pub mod store;

// Re-export main types
pub use codec::{CodecConfig, CompressionAlgorithm, EnvelopeCodec};
pub use entry::{CacheEnvelope, CacheKey, SourceState};
pub use events::CacheEvent;
pub use flight::{FlightGroup, FlightRole};
pub use manager::{CacheService, CacheServiceConfig};
pub use metrics::{FetchMetrics, FetchMetricsSnapshot, StoreOpWindow, StoreWindowSnapshot};
pub use storage::{MemoryStorage, RedisStorage};
pub use store::{CacheStore, CacheStoreConfig};

use crate::error::Result;
use crate::health::HealthReport;
use crate::inventory::InventoryRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Request Options
// =============================================================================

/// Per-call options for [`InventoryCache::get_inventory`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// TTL for a refreshed envelope; clamped to the configured minimum
    pub ttl: Option<Duration>,
    /// Skip the store read and refresh from upstream
    pub force_refresh: bool,
}

impl GetOptions {
    /// Options for a forced refresh with the default TTL
    pub fn force() -> Self {
        Self {
            ttl: None,
            force_refresh: true,
        }
    }
}

// =============================================================================
// Inventory Snapshot
// =============================================================================

/// Records served for one key, with their provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub key: CacheKey,
    pub records: Arc<Vec<InventoryRecord>>,
    pub source_state: SourceState,
    pub fetched_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    /// Age of the served envelope at the time it was served
    pub cache_age_seconds: u64,
}

impl InventorySnapshot {
    /// Build from an envelope as observed at `now`
    pub fn from_envelope(envelope: &CacheEnvelope, now: DateTime<Utc>) -> Self {
        Self {
            key: envelope.key.clone(),
            records: Arc::clone(&envelope.payload),
            source_state: envelope.source_state,
            fetched_at: envelope.fetched_at,
            ttl_seconds: envelope.ttl_seconds,
            cache_age_seconds: envelope.age_seconds(now),
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}

// =============================================================================
// Key State
// =============================================================================

/// State of a cache key as observed at request time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    /// No envelope stored
    Cold,
    /// Envelope within its TTL
    Fresh,
    /// Envelope past its TTL, nothing in flight
    Stale,
    /// Upstream fetch in flight
    Refreshing,
}

/// Outcome of a cache clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// Every delete reached the store
    pub cleared: bool,
    /// Keys that existed and were removed
    pub keys_removed: usize,
}

// =============================================================================
// InventoryCache Trait (Port)
// =============================================================================

/// Cache-first access to inventory.
///
/// The query layer and the HTTP surface depend on this trait rather than on
/// [`CacheService`] directly.
#[async_trait]
pub trait InventoryCache: Send + Sync {
    /// Serve the envelope for `key`, refreshing it from upstream when it is
    /// missing, expired or `force_refresh` is set.
    ///
    /// Fails only with `NoDataAvailable`, when a refresh fails and there is no
    /// envelope to fall back on.
    async fn get_inventory(&self, key: &CacheKey, options: GetOptions) -> Result<InventorySnapshot>;

    /// Proactively refresh the full inventory
    async fn warm_up(&self) -> Result<InventorySnapshot>;

    /// Delete every known key and reset the hit/miss/call counters
    async fn clear_cache(&self) -> Result<ClearReport>;

    /// Probe the store and classify cache and upstream health
    async fn health_check(&self) -> HealthReport;

    /// Observe the state of a key without changing it
    async fn key_state(&self, key: &CacheKey) -> Result<KeyState>;

    /// Current fetch metrics
    fn metrics_snapshot(&self) -> FetchMetricsSnapshot;
}

/// Type alias for Arc'd InventoryCache
pub type InventoryCacheRef = Arc<dyn InventoryCache>;

// =============================================================================
// Tests
// =============================================================================
