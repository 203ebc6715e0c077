//! Inventory Cache Gateway
//!
//! A cache-first gateway in front of a slow, rate-limited inventory
//! reporting API. Reads are served from a key-value store while fresh,
//! refreshed from upstream when they expire, and served stale (and flagged
//! as such) when the upstream cannot be reached.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                               HTTP Surface                                   │
//! │        GET /inventory                     POST /inventory/cache              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌──────────────────────────┐  ┌────────────────────┐  │
//! │  │  Inventory      │  │      Cache Service       │  │  Health & Metrics  │  │
//! │  │  Query          │─▶│  (TTL, single flight,    │─▶│                    │  │
//! │  │  (filters)      │  │   stale fallback)        │  │                    │  │
//! │  └─────────────────┘  └────────────┬─────────────┘  └────────────────────┘  │
//! │                                    │                                         │
//! │                 ┌──────────────────┴───────────────────┐                     │
//! │                 ▼                                      ▼                     │
//! │  ┌─────────────────────────────┐      ┌────────────────────────────────┐    │
//! │  │     Cache Store Adapter     │      │    Upstream Source Adapter     │    │
//! │  │     (memory or redis)       │      │  (reqwest + retry + transform) │    │
//! │  └─────────────────────────────┘      └────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST handlers and server
//! - [`cache`]: Cache service, store adapter, single flight and metrics
//! - [`config`]: Service configuration
//! - [`domain`]: Port traits for the store and the upstream
//! - [`health`]: Health classification
//! - [`inventory`]: Records, transformation and queries
//! - [`upstream`]: Reporting API client
//! - [`error`]: Error types and handling

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod inventory;
pub mod upstream;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestConfig, RestRouter};

pub use cache::{
    CacheKey, CacheService, CacheServiceConfig, CacheStore, CacheStoreConfig, ClearReport,
    FetchMetricsSnapshot, GetOptions, InventoryCache, InventoryCacheRef, InventorySnapshot,
    KeyState, SourceState,
};

pub use clock::{Clock, ClockRef, SystemClock};

pub use config::{ConfigOverrides, ServiceConfig};

pub use domain::ports::{KeyValueStore, KeyValueStoreRef, UpstreamSource, UpstreamSourceRef};

pub use error::{Error, FetchError, Result};

pub use health::{ComponentState, HealthReport};

pub use inventory::{InventoryFilter, InventoryQuery, InventoryRecord, QueryResult, RawRecord};

pub use upstream::{RetryPolicy, UpstreamClient, UpstreamClientConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
