//! Domain Ports - Core trait definitions for the inventory cache
//!
//! These traits define the boundaries between the cache orchestration and
//! external systems. Adapters implement these traits to provide concrete
//! functionality.

use crate::error::{FetchError, Result};
use crate::inventory::RawRecord;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Key-Value Store Port
// =============================================================================

/// Raw byte store backing the cache.
///
/// Implementations may fail or stall; the typed
/// [`CacheStore`](crate::cache::CacheStore) adapter bounds every call with a
/// timeout and turns failures into `StoreUnavailable`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the backend name (for logs)
    fn backend_name(&self) -> &str;

    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value`, replacing any previous value.
    ///
    /// `retention` is how long the backend should physically keep the value;
    /// `None` keeps it until deleted.
    async fn set(&self, key: &str, value: Bytes, retention: Option<Duration>) -> Result<()>;

    /// Delete a key, returning true if it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Type alias for Arc'd KeyValueStore
pub type KeyValueStoreRef = Arc<dyn KeyValueStore>;

// =============================================================================
// Upstream Source Port
// =============================================================================

/// The external inventory reporting API
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Get the source name (for logs)
    fn source_name(&self) -> &str;

    /// Fetch the complete inventory report.
    ///
    /// Implementations own their retry and timeout policy; a returned error is
    /// final for this call.
    async fn fetch_all(&self) -> std::result::Result<Vec<RawRecord>, FetchError>;
}

/// Type alias for Arc'd UpstreamSource
pub type UpstreamSourceRef = Arc<dyn UpstreamSource>;
