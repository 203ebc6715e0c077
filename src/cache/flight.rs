//! Single-Flight Group
//!
//! Collapses concurrent fetches for the same key into one execution. The
//! first caller for a key (the leader) spawns the work; everyone arriving
//! while it runs awaits the same shared outcome. The entry is removed as soon
//! as the work finishes, whether it succeeded, failed or panicked.
//!
//! The work runs on its own task, so a leader whose request is dropped does
//! not cancel the fetch for the followers still waiting on it.

use crate::error::FetchError;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outcome shared by every caller of one flight
pub type FlightResult<V> = Result<V, FetchError>;

type SharedFlight<V> = Shared<BoxFuture<'static, FlightResult<V>>>;

type FlightMap<K, V> = Arc<Mutex<HashMap<K, (u64, SharedFlight<V>)>>>;

// =============================================================================
// Flight Group
// =============================================================================

/// Per-key deduplication of in-flight work
pub struct FlightGroup<K, V> {
    inflight: FlightMap<K, V>,
    next_id: AtomicU64,
}

impl<K, V> Default for FlightGroup<K, V> {
    fn default() -> Self {
        Self {
            inflight: Arc::default(),
            next_id: AtomicU64::new(0),
        }
    }
}

/// How a caller took part in a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Started the work
    Leader,
    /// Joined work already in flight
    Follower,
}

impl<K, V> FlightGroup<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key` unless a run is already in flight, in which case
    /// wait for that run's outcome instead. `work` is only invoked by the leader.
    pub async fn run<F, Fut>(&self, key: &K, work: F) -> (FlightResult<V>, FlightRole)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<V>> + Send + 'static,
    {
        let (flight, role) = {
            let mut inflight = self.inflight.lock();
            match inflight.get(key) {
                Some((_, flight)) => (flight.clone(), FlightRole::Follower),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let guard = FlightGuard {
                        inflight: Arc::clone(&self.inflight),
                        key: key.clone(),
                        id,
                    };
                    let fetch = work();
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        fetch.await
                    });

                    let flight = async move {
                        match handle.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(FetchError::Aborted(e.to_string())),
                        }
                    }
                    .boxed()
                    .shared();

                    inflight.insert(key.clone(), (id, flight.clone()));
                    (flight, FlightRole::Leader)
                }
            }
        };

        (flight.await, role)
    }

    /// Check whether work for `key` is currently in flight
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.lock().contains_key(key)
    }
}

/// Removes a flight's entry when its task ends, including by panic
struct FlightGuard<K: Hash + Eq, V> {
    inflight: FlightMap<K, V>,
    key: K,
    id: u64,
}

impl<K: Hash + Eq, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
            inflight.remove(&self.key);
        }
    }
}
