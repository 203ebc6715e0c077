//! Cache Metrics
//!
//! Cache-line aligned counters for the orchestrator's decision points, plus
//! the rolling window of store operation outcomes used for health.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

// =============================================================================
// Cache Line Size
// =============================================================================

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

// =============================================================================
// Fetch Counters (Cache-Line Aligned)
// =============================================================================

/// Hot counters, aligned to prevent false sharing with neighbouring data
#[repr(C, align(64))]
#[derive(Debug)]
pub struct FetchCounters {
    /// Fresh envelopes served from the store
    pub cache_hits: AtomicU64,
    /// Requests that needed an upstream fetch
    pub cache_misses: AtomicU64,
    /// Upstream adapter invocations
    pub api_calls: AtomicU64,
    /// Store operations that failed or timed out
    pub store_failures: AtomicU64,
    /// Expired envelopes served after a failed refresh
    pub stale_served: AtomicU64,
    /// Padding to fill cache line
    _padding: [u8; 24],
}

// Verify size at compile time
const _: () = assert!(std::mem::size_of::<FetchCounters>() <= CACHE_LINE_SIZE);

impl Default for FetchCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchCounters {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            api_calls: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
            _padding: [0; 24],
        }
    }
}

// =============================================================================
// Fetch Metrics
// =============================================================================

#[derive(Debug, Default)]
struct FetchHistory {
    last_fetch_at: Option<DateTime<Utc>>,
    last_fetch_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

/// Process-wide fetch metrics
#[derive(Debug, Default)]
pub struct FetchMetrics {
    counters: FetchCounters,
    history: RwLock<FetchHistory>,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh envelope served from the store
    #[inline]
    pub fn record_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that needed a fetch
    #[inline]
    pub fn record_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upstream adapter invocation
    #[inline]
    pub fn record_api_call(&self) {
        self.counters.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed store operation
    #[inline]
    pub fn record_store_failure(&self) {
        self.counters.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale envelope being served
    #[inline]
    pub fn record_stale_served(&self) {
        self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful fetch. Clears the last error.
    pub fn record_fetch_success(&self, at: DateTime<Utc>) {
        let mut history = self.history.write();
        history.last_fetch_at = Some(at);
        history.last_fetch_error = None;
        history.last_error_at = None;
    }

    /// Record a failed fetch
    pub fn record_fetch_failure(&self, error: impl ToString, at: DateTime<Utc>) {
        let mut history = self.history.write();
        history.last_fetch_error = Some(error.to_string());
        history.last_error_at = Some(at);
    }

    /// Reset hit, miss and call counters. Fetch history is kept.
    pub fn reset_counters(&self) {
        self.counters.cache_hits.store(0, Ordering::Relaxed);
        self.counters.cache_misses.store(0, Ordering::Relaxed);
        self.counters.api_calls.store(0, Ordering::Relaxed);
    }

    pub fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.history.read().last_fetch_at
    }

    pub fn last_fetch_error(&self) -> Option<String> {
        self.history.read().last_fetch_error.clone()
    }

    /// Create a snapshot of current metrics
    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        let history = self.history.read();
        FetchMetricsSnapshot {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            api_calls: self.counters.api_calls.load(Ordering::Relaxed),
            store_failures: self.counters.store_failures.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
            last_fetch_at: history.last_fetch_at,
            last_fetch_error: history.last_fetch_error.clone(),
            last_error_at: history.last_error_at,
        }
    }
}

// =============================================================================
// Fetch Metrics Snapshot
// =============================================================================

/// Point-in-time snapshot of fetch metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub api_calls: u64,
    pub store_failures: u64,
    pub stale_served: u64,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_fetch_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl FetchMetricsSnapshot {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Store Operation Window
// =============================================================================

/// Number of recent store operations tracked
pub const STORE_WINDOW: u8 = 3;

const OUTCOME_MASK: u8 = (1 << STORE_WINDOW) - 1;

/// Outcomes of the last [`STORE_WINDOW`] store operations.
///
/// Packed into one byte: the low bits hold failure flags (newest in bit 0),
/// the high nibble holds how many operations have been recorded so far.
#[derive(Debug, Default)]
pub struct StoreOpWindow {
    state: AtomicU8,
}

impl StoreOpWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one store operation
    pub fn record(&self, success: bool) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let recorded = ((state >> 4) + 1).min(STORE_WINDOW);
                let outcomes = ((state << 1) | u8::from(!success)) & OUTCOME_MASK;
                Some((recorded << 4) | outcomes)
            });
    }

    /// Current window contents
    pub fn snapshot(&self) -> StoreWindowSnapshot {
        let state = self.state.load(Ordering::Acquire);
        StoreWindowSnapshot {
            recorded: state >> 4,
            failed: (state & OUTCOME_MASK).count_ones() as u8,
        }
    }
}

/// Counts taken from a [`StoreOpWindow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreWindowSnapshot {
    /// Operations recorded, at most [`STORE_WINDOW`]
    pub recorded: u8,
    /// Failures among them
    pub failed: u8,
}
