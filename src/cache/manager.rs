//! Cache Service
//!
//! The cache-first orchestrator. Serves fresh envelopes from the store,
//! refreshes expired or missing ones through the upstream with at most one
//! fetch per key in flight, and falls back to stale data when a refresh fails.

use crate::cache::entry::{CacheEnvelope, CacheKey, SourceState, MAX_TTL_SECONDS};
use crate::cache::events::CacheEvent;
use crate::cache::flight::{FlightGroup, FlightResult, FlightRole};
use crate::cache::metrics::{FetchMetrics, FetchMetricsSnapshot};
use crate::cache::store::CacheStore;
use crate::cache::{ClearReport, GetOptions, InventoryCache, InventorySnapshot, KeyState};
use crate::clock::{ClockRef, SystemClock};
use crate::domain::UpstreamSourceRef;
use crate::error::{Error, FetchError, Result};
use crate::health::{self, HealthReport};
use crate::inventory::transform_with_report;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the cache service
#[derive(Debug, Clone)]
pub struct CacheServiceConfig {
    /// TTL applied when the caller gives none
    pub default_ttl: Duration,
    /// Lower bound on any TTL
    pub min_ttl: Duration,
    /// Event channel capacity
    pub event_channel_capacity: usize,
}

impl Default for CacheServiceConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(15 * 60),
            min_ttl: Duration::from_secs(60),
            event_channel_capacity: 1024,
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// State shared between the service and the refresh tasks it spawns
#[derive(Clone)]
struct Shared {
    store: CacheStore,
    upstream: UpstreamSourceRef,
    clock: ClockRef,
    metrics: Arc<FetchMetrics>,
    known_keys: Arc<DashSet<CacheKey>>,
    event_tx: broadcast::Sender<CacheEvent>,
}

impl Shared {
    fn emit(&self, event: CacheEvent) {
        let _ = self.event_tx.send(event);
    }

    fn store_failed(&self, error: &Error) {
        self.metrics.record_store_failure();
        if let Error::StoreUnavailable { operation, reason } = error {
            self.emit(CacheEvent::StoreUnavailable {
                operation: operation.to_string(),
                reason: reason.clone(),
            });
        }
    }

    fn fetch_failed(&self, key: &CacheKey, error: &FetchError) {
        self.metrics.record_fetch_failure(error, self.clock.now());
        self.emit(CacheEvent::fetch_failed(key, error));
    }

    /// Fetch, transform and store one key. Runs as the single flight for `key`.
    async fn refresh(self, key: CacheKey, ttl_seconds: u64) -> FlightResult<Arc<CacheEnvelope>> {
        self.emit(CacheEvent::fetch_started(&key));
        self.metrics.record_api_call();
        let started = Instant::now();

        let raw = match self.upstream.fetch_all().await {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = %key, kind = e.kind(), error = %e, "Upstream refresh failed");
                self.fetch_failed(&key, &e);
                return Err(e);
            }
        };

        let report = transform_with_report(&raw);
        let records: Vec<_> = report
            .records
            .into_iter()
            .filter(|record| key.admits(record))
            .collect();

        let fetched_at = self.clock.now();
        let envelope = CacheEnvelope::fresh(key.clone(), records, fetched_at, ttl_seconds);

        if let Err(e) = self.store.set(&envelope).await {
            warn!(key = %key, error = %e, "Refreshed envelope not written, serving it uncached");
            self.store_failed(&e);
        }

        self.metrics.record_fetch_success(fetched_at);
        self.known_keys.insert(key.clone());

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            key = %key,
            records = envelope.record_count(),
            dropped = report.dropped,
            duration_ms,
            "Inventory refreshed from upstream"
        );
        self.emit(CacheEvent::fetch_completed(&key, envelope.record_count(), duration_ms));

        Ok(Arc::new(envelope))
    }
}

// =============================================================================
// Cache Service
// =============================================================================

/// Cache-first orchestrator over a store and an upstream source
pub struct CacheService {
    shared: Shared,
    flights: FlightGroup<CacheKey, Arc<CacheEnvelope>>,
    config: CacheServiceConfig,
}

impl CacheService {
    /// Create a new cache service using the system clock
    pub fn new(
        store: CacheStore,
        upstream: UpstreamSourceRef,
        config: CacheServiceConfig,
    ) -> Arc<Self> {
        Self::with_clock(store, upstream, config, Arc::new(SystemClock))
    }

    /// Create a new cache service with an explicit time source
    pub fn with_clock(
        store: CacheStore,
        upstream: UpstreamSourceRef,
        config: CacheServiceConfig,
        clock: ClockRef,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        info!(
            backend = %store.backend_name(),
            upstream = %upstream.source_name(),
            default_ttl_secs = config.default_ttl.as_secs(),
            min_ttl_secs = config.min_ttl.as_secs(),
            "Cache service initialized"
        );

        Arc::new(Self {
            shared: Shared {
                store,
                upstream,
                clock,
                metrics: Arc::new(FetchMetrics::new()),
                known_keys: Arc::new(DashSet::new()),
                event_tx,
            },
            flights: FlightGroup::new(),
            config,
        })
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn config(&self) -> &CacheServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.shared.store
    }

    pub fn metrics(&self) -> &FetchMetrics {
        &self.shared.metrics
    }

    pub fn clock(&self) -> &ClockRef {
        &self.shared.clock
    }

    /// Keys with an envelope written by this process
    pub fn known_keys(&self) -> Vec<CacheKey> {
        self.shared.known_keys.iter().map(|k| k.key().clone()).collect()
    }

    /// TTL in seconds after applying the default and the minimum
    pub fn effective_ttl_seconds(&self, requested: Option<Duration>) -> u64 {
        requested
            .unwrap_or(self.config.default_ttl)
            .max(self.config.min_ttl)
            .as_secs()
            .clamp(1, MAX_TTL_SECONDS)
    }

    fn snapshot_of(&self, envelope: &CacheEnvelope) -> InventorySnapshot {
        InventorySnapshot::from_envelope(envelope, self.shared.clock.now())
    }

    /// Serve a stale envelope for a failed refresh, or give up with `NoDataAvailable`
    async fn fall_back(
        &self,
        key: &CacheKey,
        candidate: Option<CacheEnvelope>,
        cause: FetchError,
    ) -> Result<InventorySnapshot> {
        let candidate = match candidate {
            Some(envelope) => Some(envelope),
            None => match self.shared.store.get(key).await {
                Ok(found) => found,
                Err(e) => {
                    self.shared.store_failed(&e);
                    None
                }
            },
        };

        let Some(envelope) = candidate else {
            error!(key = %key, kind = cause.kind(), "No cached inventory to fall back on");
            return Err(Error::NoDataAvailable {
                key: key.to_storage_key(),
                cause,
            });
        };

        let stale = envelope.as_stale_fallback();
        let snapshot = self.snapshot_of(&stale);
        self.shared.metrics.record_stale_served();
        warn!(
            key = %key,
            age_seconds = snapshot.cache_age_seconds,
            kind = cause.kind(),
            "Serving stale inventory after failed refresh"
        );
        self.shared
            .emit(CacheEvent::served(key, SourceState::StaleFallback, snapshot.cache_age_seconds));
        Ok(snapshot)
    }
}

#[async_trait]
impl InventoryCache for CacheService {
    async fn get_inventory(&self, key: &CacheKey, options: GetOptions) -> Result<InventorySnapshot> {
        let ttl_seconds = self.effective_ttl_seconds(options.ttl);
        let mut fallback = None;

        if !options.force_refresh {
            match self.shared.store.get(key).await {
                Ok(Some(envelope)) if envelope.is_fresh_at(self.shared.clock.now()) => {
                    self.shared.metrics.record_hit();
                    let snapshot = self.snapshot_of(&envelope);
                    debug!(key = %key, age_seconds = snapshot.cache_age_seconds, "Cache hit");
                    self.shared.emit(CacheEvent::hit(key, snapshot.cache_age_seconds));
                    return Ok(snapshot);
                }
                Ok(stale) => fallback = stale,
                Err(e) => self.shared.store_failed(&e),
            }
        }

        self.shared.metrics.record_miss();
        self.shared.emit(CacheEvent::miss(key, fallback.is_some()));

        let refresh = self.shared.clone().refresh(key.clone(), ttl_seconds);
        let (outcome, role) = self.flights.run(key, move || refresh).await;
        if role == FlightRole::Follower {
            debug!(key = %key, "Joined in-flight refresh");
        }

        match outcome {
            Ok(envelope) => Ok(self.snapshot_of(&envelope)),
            Err(cause) => {
                if role == FlightRole::Leader && matches!(cause, FetchError::Aborted(_)) {
                    self.shared.fetch_failed(key, &cause);
                }
                self.fall_back(key, fallback, cause).await
            }
        }
    }

    async fn warm_up(&self) -> Result<InventorySnapshot> {
        info!("Warming inventory cache");
        self.get_inventory(&CacheKey::All, GetOptions::force()).await
    }

    async fn clear_cache(&self) -> Result<ClearReport> {
        let mut keys = self.known_keys();
        if !keys.contains(&CacheKey::All) {
            keys.push(CacheKey::All);
        }

        let mut report = ClearReport {
            cleared: true,
            keys_removed: 0,
        };
        for key in keys {
            match self.shared.store.delete(&key).await {
                Ok(removed) => {
                    self.shared.known_keys.remove(&key);
                    if removed {
                        report.keys_removed += 1;
                    }
                }
                Err(e) => {
                    self.shared.store_failed(&e);
                    report.cleared = false;
                }
            }
        }

        self.shared.metrics.reset_counters();
        info!(
            keys_removed = report.keys_removed,
            cleared = report.cleared,
            "Inventory cache cleared"
        );
        self.shared.emit(CacheEvent::Cleared {
            keys_removed: report.keys_removed,
        });
        Ok(report)
    }

    async fn health_check(&self) -> HealthReport {
        let probe = self.shared.store.probe().await;
        if let Err(e) = &probe {
            self.shared.store_failed(e);
        }

        health::assess(
            self.shared.store.recent_operations(),
            self.shared.metrics.snapshot(),
            self.config.default_ttl,
            self.shared.clock.now(),
        )
    }

    async fn key_state(&self, key: &CacheKey) -> Result<KeyState> {
        if self.flights.is_in_flight(key) {
            return Ok(KeyState::Refreshing);
        }
        let state = match self.shared.store.get(key).await? {
            None => KeyState::Cold,
            Some(envelope) if envelope.is_fresh_at(self.shared.clock.now()) => KeyState::Fresh,
            Some(_) => KeyState::Stale,
        };
        Ok(state)
    }

    fn metrics_snapshot(&self) -> FetchMetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("store", &self.shared.store)
            .field("upstream", &self.shared.upstream.source_name())
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::testing::FlakyStore;
    use crate::clock::ManualClock;
    use crate::health::ComponentState;
    use crate::upstream::testing::{raw, ScriptedUpstream};
    use assert_matches::assert_matches;
    use chrono::Duration as ChronoDuration;

    struct Harness {
        service: Arc<CacheService>,
        upstream: Arc<ScriptedUpstream>,
        backend: Arc<FlakyStore>,
        clock: Arc<ManualClock>,
    }

    fn harness(upstream: ScriptedUpstream) -> Harness {
        let upstream = Arc::new(upstream);
        let backend = Arc::new(FlakyStore::default());
        let clock = ManualClock::starting_now();
        let service = CacheService::with_clock(
            CacheStore::with_backend(backend.clone()),
            upstream.clone(),
            CacheServiceConfig::default(),
            clock.clone(),
        );
        Harness {
            service,
            upstream,
            backend,
            clock,
        }
    }

    fn three_records() -> ScriptedUpstream {
        ScriptedUpstream::returning(vec![
            raw("A", 5, Some("Acme")),
            raw("B", 0, Some("Globex")),
            raw("", 2, None),
        ])
    }

    fn ttl(seconds: u64) -> GetOptions {
        GetOptions {
            ttl: Some(Duration::from_secs(seconds)),
            force_refresh: false,
        }
    }

    #[tokio::test]
    async fn test_cold_fetch_then_hit() {
        let h = harness(three_records());

        let first = h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        assert_eq!(first.source_state, SourceState::Fresh);
        assert_eq!(first.count(), 2);
        assert_eq!(h.upstream.calls(), 1);

        let second = h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        assert_eq!(second.records, first.records);
        assert_eq!(h.upstream.calls(), 1);

        let metrics = h.service.metrics_snapshot();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.api_calls, 1);
        assert!(metrics.last_fetch_at.is_some());
    }

    #[tokio::test]
    async fn test_ttl_respected() {
        let h = harness(three_records());

        h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        assert_eq!(h.upstream.calls(), 1);

        h.clock.advance(ChronoDuration::seconds(30));
        let hit = h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        assert_eq!(hit.cache_age_seconds, 30);
        assert_eq!(h.service.metrics_snapshot().cache_hits, 1);
        assert_eq!(h.service.metrics_snapshot().api_calls, 1);

        h.clock.advance(ChronoDuration::seconds(31));
        let refreshed = h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        assert_eq!(refreshed.source_state, SourceState::Fresh);
        assert_eq!(refreshed.cache_age_seconds, 0);
        assert_eq!(h.service.metrics_snapshot().api_calls, 2);
        assert_eq!(h.upstream.calls(), 2);
    }

    #[tokio::test]
    async fn test_ttl_clamped_to_minimum() {
        let h = harness(three_records());

        assert_eq!(h.service.effective_ttl_seconds(Some(Duration::from_secs(5))), 60);
        assert_eq!(h.service.effective_ttl_seconds(None), 900);

        h.service.get_inventory(&CacheKey::All, ttl(5)).await.unwrap();
        h.clock.advance(ChronoDuration::seconds(30));
        h.service.get_inventory(&CacheKey::All, ttl(5)).await.unwrap();
        assert_eq!(h.upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_forced_refreshes_collapse() {
        let h = harness(three_records().with_delay(Duration::from_millis(100)));

        let callers: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&h.service);
                tokio::spawn(async move {
                    service.get_inventory(&CacheKey::All, GetOptions::force()).await
                })
            })
            .collect();

        let mut payloads = Vec::new();
        for caller in callers {
            payloads.push(caller.await.unwrap().unwrap());
        }

        assert_eq!(h.upstream.calls(), 1);
        assert_eq!(h.service.metrics_snapshot().api_calls, 1);
        assert_eq!(h.service.metrics_snapshot().cache_misses, 20);
        for payload in &payloads {
            assert!(Arc::ptr_eq(&payload.records, &payloads[0].records));
            assert_eq!(payload.source_state, SourceState::Fresh);
        }
    }

    #[tokio::test]
    async fn test_concurrent_failed_refreshes_share_stale_fallback() {
        let h = harness(three_records().with_delay(Duration::from_millis(100)));
        let fresh = h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        assert_eq!(h.upstream.calls(), 1);

        h.upstream.set_fallback(Err(FetchError::Transport("connection reset".into())));

        let callers: Vec<_> = (0..16)
            .map(|_| {
                let service = Arc::clone(&h.service);
                tokio::spawn(async move {
                    service.get_inventory(&CacheKey::All, GetOptions::force()).await
                })
            })
            .collect();

        for caller in callers {
            let snapshot = caller.await.unwrap().unwrap();
            assert_eq!(snapshot.source_state, SourceState::StaleFallback);
            assert_eq!(snapshot.records, fresh.records);
        }

        assert_eq!(h.upstream.calls(), 2);
        assert_eq!(h.service.metrics_snapshot().stale_served, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_still_serves_fresh_data() {
        let h = harness(three_records());
        h.backend.set_hanging(true);

        let started = tokio::time::Instant::now();
        let snapshot = h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();

        assert_eq!(snapshot.source_state, SourceState::Fresh);
        assert_eq!(snapshot.count(), 2);
        assert_eq!(h.upstream.calls(), 1);

        // One bounded read and one bounded write, then the fetched data is served
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(h.service.metrics_snapshot().store_failures, 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_on_timeout() {
        let h = harness(three_records());
        let fresh = h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();

        h.upstream.set_fallback(Err(FetchError::Timeout {
            after: Duration::from_secs(30),
        }));
        h.clock.advance(ChronoDuration::seconds(120));

        let stale = h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        assert_eq!(stale.source_state, SourceState::StaleFallback);
        assert_eq!(stale.records, fresh.records);
        assert_eq!(stale.cache_age_seconds, 120);

        let metrics = h.service.metrics_snapshot();
        assert!(metrics.last_fetch_error.unwrap().contains("timed out"));
        assert_eq!(metrics.stale_served, 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_failure_rereads_previous_envelope() {
        let h = harness(three_records());
        h.service.warm_up().await.unwrap();

        h.upstream
            .set_fallback(Err(FetchError::MalformedResponse("truncated".into())));
        let snapshot = h.service.warm_up().await.unwrap();

        assert_eq!(snapshot.source_state, SourceState::StaleFallback);
        assert_eq!(snapshot.count(), 2);
    }

    #[tokio::test]
    async fn test_cold_failure_is_no_data_available() {
        let h = harness(ScriptedUpstream::failing(FetchError::AuthFailure { status: 401 }));

        let result = h.service.get_inventory(&CacheKey::All, GetOptions::default()).await;
        assert_matches!(
            result,
            Err(Error::NoDataAvailable { key, cause: FetchError::AuthFailure { status: 401 } })
                if key == "inventory:all"
        );
    }

    #[tokio::test]
    async fn test_store_outage_bypasses_cache() {
        let h = harness(three_records());
        h.backend.set_failing(true);

        let snapshot = h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        assert_eq!(snapshot.source_state, SourceState::Fresh);
        assert_eq!(snapshot.count(), 2);

        // Nothing could be written, so the next read fetches again
        h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        assert_eq!(h.upstream.calls(), 2);
        assert!(h.service.metrics_snapshot().store_failures >= 2);
    }

    #[tokio::test]
    async fn test_store_outage_and_upstream_failure_is_no_data() {
        let h = harness(three_records());
        h.service.warm_up().await.unwrap();

        h.backend.set_failing(true);
        h.upstream.set_fallback(Err(FetchError::Transport("reset".into())));

        let result = h.service.get_inventory(&CacheKey::All, GetOptions::force()).await;
        assert_matches!(result, Err(Error::NoDataAvailable { .. }));
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_envelope_untouched() {
        let h = harness(three_records());
        h.service.get_inventory(&CacheKey::All, ttl(60)).await.unwrap();
        let before = h.service.store().get(&CacheKey::All).await.unwrap().unwrap();

        h.upstream
            .set_fallback(Err(FetchError::MalformedResponse("bad json".into())));
        h.service.get_inventory(&CacheKey::All, GetOptions::force()).await.unwrap();

        let after = h.service.store().get(&CacheKey::All).await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(after.source_state, SourceState::Fresh);
    }

    #[tokio::test]
    async fn test_vendor_key_materializes_subset() {
        let h = harness(three_records());

        let acme = h
            .service
            .get_inventory(&CacheKey::vendor("Acme"), GetOptions::default())
            .await
            .unwrap();
        assert_eq!(acme.count(), 1);
        assert_eq!(acme.records[0].sku, "A");
        assert!(h.service.known_keys().contains(&CacheKey::vendor("Acme")));
    }

    #[tokio::test]
    async fn test_clear_cache_then_health_check() {
        let h = harness(three_records());
        h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        h.service
            .get_inventory(&CacheKey::vendor("Acme"), GetOptions::default())
            .await
            .unwrap();

        let report = h.service.clear_cache().await.unwrap();
        assert!(report.cleared);
        assert_eq!(report.keys_removed, 2);
        assert_eq!(h.service.key_state(&CacheKey::All).await.unwrap(), KeyState::Cold);

        let health = h.service.health_check().await;
        assert_eq!(health.cache_state, ComponentState::Healthy);
        assert_eq!(health.metrics.cache_hits, 0);
        assert_eq!(health.metrics.api_calls, 0);
        assert!(health.metrics.last_fetch_at.is_some());
    }

    #[tokio::test]
    async fn test_clear_cache_reports_store_failure() {
        let h = harness(three_records());
        h.backend.set_failing(true);

        let report = h.service.clear_cache().await.unwrap();
        assert!(!report.cleared);
    }

    #[tokio::test]
    async fn test_key_states() {
        let h = harness(three_records().with_delay(Duration::from_millis(50)));
        assert_eq!(h.service.key_state(&CacheKey::All).await.unwrap(), KeyState::Cold);

        let service = Arc::clone(&h.service);
        let pending = tokio::spawn(async move {
            service.get_inventory(&CacheKey::All, ttl(60)).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.service.key_state(&CacheKey::All).await.unwrap(), KeyState::Refreshing);

        pending.await.unwrap().unwrap();
        assert_eq!(h.service.key_state(&CacheKey::All).await.unwrap(), KeyState::Fresh);

        h.clock.advance(ChronoDuration::seconds(61));
        assert_eq!(h.service.key_state(&CacheKey::All).await.unwrap(), KeyState::Stale);
    }

    #[tokio::test]
    async fn test_events_broadcast() {
        let h = harness(three_records());
        let mut events = h.service.subscribe();

        h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();
        h.service.get_inventory(&CacheKey::All, GetOptions::default()).await.unwrap();

        assert_matches!(events.recv().await.unwrap(), CacheEvent::Miss { stale_present: false, .. });
        assert_matches!(events.recv().await.unwrap(), CacheEvent::FetchStarted { .. });
        assert_matches!(events.recv().await.unwrap(), CacheEvent::FetchCompleted { records: 2, .. });
        assert_matches!(events.recv().await.unwrap(), CacheEvent::Hit { .. });
    }

    #[tokio::test]
    async fn test_success_after_failure_clears_error() {
        let h = harness(
            ScriptedUpstream::returning(vec![raw("A", 1, None)])
                .then(Err(FetchError::RateLimited { retry_after: None })),
        );

        assert!(h.service.warm_up().await.is_err());
        assert!(h.service.metrics_snapshot().last_fetch_error.is_some());

        h.service.warm_up().await.unwrap();
        assert_eq!(h.service.metrics_snapshot().last_fetch_error, None);
    }
}
