//! Cache Store Adapter
//!
//! Typed envelope operations over a [`KeyValueStore`]. Every call is bounded
//! by a timeout, and every failure (backend error, timeout, undecodable bytes)
//! comes back as [`Error::StoreUnavailable`] so callers can route around the
//! store instead of failing.

use crate::cache::codec::EnvelopeCodec;
use crate::cache::entry::{CacheEnvelope, CacheKey, KEY_PREFIX, MAX_TTL_SECONDS};
use crate::cache::metrics::{StoreOpWindow, StoreWindowSnapshot};
use crate::domain::KeyValueStoreRef;
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// =============================================================================
// Store Configuration
// =============================================================================

/// Configuration for the cache store adapter
#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    /// Upper bound on any single store call
    pub operation_timeout: Duration,
    /// Physical retention as a multiple of the envelope TTL (0 = keep until deleted)
    pub retention_factor: u32,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(2),
            retention_factor: 10,
        }
    }
}

// =============================================================================
// Cache Store
// =============================================================================

/// Typed, time-bounded view of the key-value store
#[derive(Clone)]
pub struct CacheStore {
    backend: KeyValueStoreRef,
    codec: EnvelopeCodec,
    config: CacheStoreConfig,
    window: Arc<StoreOpWindow>,
}

impl CacheStore {
    pub fn new(backend: KeyValueStoreRef, codec: EnvelopeCodec, config: CacheStoreConfig) -> Self {
        Self {
            backend,
            codec,
            config,
            window: Arc::new(StoreOpWindow::new()),
        }
    }

    /// Create with default codec and timeouts
    pub fn with_backend(backend: KeyValueStoreRef) -> Self {
        Self::new(backend, EnvelopeCodec::default(), CacheStoreConfig::default())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    /// Outcomes of the most recent store operations
    pub fn recent_operations(&self) -> StoreWindowSnapshot {
        self.window.snapshot()
    }

    /// Read the envelope for `key`.
    ///
    /// Undecodable or mismatched bytes count as a failed read in the health
    /// window, the same as a backend error.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEnvelope>> {
        let storage_key = key.to_storage_key();
        let outcome = match self.timed("get", self.backend.get(&storage_key)).await {
            Ok(Some(bytes)) => match self.codec.decode(&bytes) {
                Ok(envelope) if envelope.key == *key => Ok(Some(envelope)),
                Ok(envelope) => Err(Error::store(
                    "get",
                    format!("envelope under {} is keyed {}", storage_key, envelope.key),
                )),
                Err(e) => Err(Error::store("get", format!("undecodable envelope: {}", e))),
            },
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.settle("get", outcome)
    }

    /// Write an envelope, replacing whatever was stored under its key
    pub async fn set(&self, envelope: &CacheEnvelope) -> Result<()> {
        let storage_key = envelope.key.to_storage_key();
        let bytes = match self.codec.encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => return self.settle("set", Err(Error::store("set", e))),
        };
        let size = bytes.len();

        self.bounded("set", self.backend.set(&storage_key, bytes, self.retention(envelope)))
            .await?;
        debug!(key = %storage_key, bytes = size, records = envelope.record_count(), "Stored envelope");
        Ok(())
    }

    /// Delete the envelope for `key`, returning true if one existed
    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.bounded("delete", self.backend.delete(&key.to_storage_key()))
            .await
    }

    /// Check whether an envelope exists for `key`
    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        self.bounded("exists", self.backend.exists(&key.to_storage_key()))
            .await
    }

    /// Reachability probe through the backend's own health check; counts as
    /// one operation in the health window
    pub async fn probe(&self) -> Result<()> {
        let backend = &self.backend;
        self.bounded("probe", async move {
            if backend.health_check().await? {
                Ok(())
            } else {
                Err(Error::store(
                    "probe",
                    format!("{} store reported unhealthy", backend.backend_name()),
                ))
            }
        })
        .await
    }

    fn retention(&self, envelope: &CacheEnvelope) -> Option<Duration> {
        if self.config.retention_factor == 0 {
            return None;
        }
        let secs = envelope
            .ttl_seconds
            .saturating_mul(u64::from(self.config.retention_factor))
            .min(MAX_TTL_SECONDS);
        Some(Duration::from_secs(secs))
    }

    /// Time-bounded call recorded as one operation in the health window
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let outcome = self.timed(operation, call).await;
        self.settle(operation, outcome)
    }

    /// Time-bounded call with every failure mapped to `StoreUnavailable`; not recorded
    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(Error::StoreUnavailable { reason, .. })) => Err(Error::store(operation, reason)),
            Ok(Err(e)) => Err(Error::store(operation, e)),
            Err(_) => Err(Error::store(
                operation,
                format!(
                    "{} store did not respond within {}ms",
                    self.backend.backend_name(),
                    self.config.operation_timeout.as_millis()
                ),
            )),
        }
    }

    /// Record the final outcome of one adapter operation
    fn settle<T>(&self, operation: &'static str, outcome: Result<T>) -> Result<T> {
        self.window.record(outcome.is_ok());
        if let Err(e) = &outcome {
            warn!(
                backend = %self.backend.backend_name(),
                operation,
                error = %e,
                "Cache store operation failed"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.backend_name())
            .field("prefix", &KEY_PREFIX)
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use crate::cache::storage::MemoryStorage;
    use crate::domain::KeyValueStore;
    use crate::error::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Memory store that can be made to hang
    #[derive(Default)]
    pub struct FlakyStore {
        pub inner: MemoryStorage,
        pub hang: AtomicBool,
    }

    impl FlakyStore {
        pub fn set_failing(&self, failing: bool) {
            self.inner.set_available(!failing);
        }

        pub fn set_hanging(&self, hanging: bool) {
            self.hang.store(hanging, Ordering::Relaxed);
        }

        async fn maybe_hang(&self) {
            if self.hang.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        fn backend_name(&self) -> &str {
            "flaky"
        }

        async fn get(&self, key: &str) -> Result<Option<Bytes>> {
            self.maybe_hang().await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Bytes, retention: Option<Duration>) -> Result<()> {
            self.maybe_hang().await;
            self.inner.set(key, value, retention).await
        }

        async fn delete(&self, key: &str) -> Result<bool> {
            self.maybe_hang().await;
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.maybe_hang().await;
            self.inner.exists(key).await
        }

        async fn health_check(&self) -> Result<bool> {
            self.maybe_hang().await;
            self.inner.health_check().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FlakyStore;
    use super::*;
    use crate::domain::KeyValueStore;
    use crate::inventory::InventoryRecord;
    use bytes::Bytes;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn envelope(key: CacheKey) -> CacheEnvelope {
        CacheEnvelope::fresh(key, vec![InventoryRecord::new("A", "Anvil", 5)], Utc::now(), 900)
    }

    #[tokio::test]
    async fn test_typed_operations() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());
        let original = envelope(CacheKey::All);

        assert_eq!(assert_ok!(store.get(&CacheKey::All).await), None);
        assert_ok!(store.set(&original).await);

        assert!(store.exists(&CacheKey::All).await.unwrap());
        assert_eq!(store.get(&CacheKey::All).await.unwrap(), Some(original));
        assert!(backend.inner.exists("inventory:all").await.unwrap());

        assert!(store.delete(&CacheKey::All).await.unwrap());
        assert!(!store.exists(&CacheKey::All).await.unwrap());
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 3, failed: 0 });
    }

    #[tokio::test]
    async fn test_backend_failure_is_store_unavailable() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());
        backend.set_failing(true);

        assert!(matches!(
            store.get(&CacheKey::All).await,
            Err(Error::StoreUnavailable { operation: "get", .. })
        ));
        assert!(matches!(
            store.set(&envelope(CacheKey::All)).await,
            Err(Error::StoreUnavailable { operation: "set", .. })
        ));
        assert_err!(store.probe().await);
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 3, failed: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());
        backend.set_hanging(true);

        let started = tokio::time::Instant::now();
        let result = store.get(&CacheKey::All).await;

        assert!(matches!(result, Err(Error::StoreUnavailable { operation: "get", .. })));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_corrupt_bytes_are_store_unavailable() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());

        backend
            .inner
            .set("inventory:all", Bytes::from_static(b"\x10not json"), None)
            .await
            .unwrap();

        assert!(matches!(
            store.get(&CacheKey::All).await,
            Err(Error::StoreUnavailable { operation: "get", .. })
        ));
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_undecodable_reads_mark_cache_down() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());

        backend
            .inner
            .set("inventory:all", Bytes::from_static(b"\x10not json"), None)
            .await
            .unwrap();

        for _ in 0..3 {
            assert_err!(store.get(&CacheKey::All).await);
        }
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 3, failed: 3 });
        assert_eq!(
            crate::health::classify_cache(store.recent_operations()),
            crate::health::ComponentState::Down
        );
    }

    #[tokio::test]
    async fn test_store_health_uses_backend_check() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());

        assert_ok!(store.probe().await);
        backend.set_failing(true);
        assert!(matches!(
            store.probe().await,
            Err(Error::StoreUnavailable { operation: "probe", .. })
        ));
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_mismatched_key_rejected() {
        let backend = Arc::new(FlakyStore::default());
        let store = CacheStore::with_backend(backend.clone());

        let vendor = envelope(CacheKey::vendor("Acme"));
        let bytes = EnvelopeCodec::default().encode(&vendor).unwrap();
        backend.inner.set("inventory:all", bytes, None).await.unwrap();

        assert!(store.get(&CacheKey::All).await.is_err());
        assert_eq!(store.recent_operations(), StoreWindowSnapshot { recorded: 1, failed: 1 });
    }

    #[test]
    fn test_retention_scales_with_ttl() {
        let store = CacheStore::with_backend(Arc::new(FlakyStore::default()));
        assert_eq!(
            store.retention(&envelope(CacheKey::All)),
            Some(Duration::from_secs(9000))
        );

        let unbounded = CacheStore::new(
            Arc::new(FlakyStore::default()),
            EnvelopeCodec::default(),
            CacheStoreConfig {
                retention_factor: 0,
                ..Default::default()
            },
        );
        assert_eq!(unbounded.retention(&envelope(CacheKey::All)), None);
    }
}
