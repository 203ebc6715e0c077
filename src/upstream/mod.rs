//! Upstream Source Adapter
//!
//! HTTP access to the external reporting API, with a hard timeout and a
//! bounded retry policy for transient failures.

pub mod client;
pub mod retry;

pub use client::{UpstreamClient, UpstreamClientConfig};
pub use retry::RetryPolicy;

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::UpstreamSource;
    use crate::error::FetchError;
    use crate::inventory::RawRecord;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Upstream that counts calls and replays scripted outcomes.
    /// Once the script runs out the fallback outcome repeats.
    pub struct ScriptedUpstream {
        calls: AtomicUsize,
        delay: Duration,
        script: Mutex<VecDeque<Result<Vec<RawRecord>, FetchError>>>,
        fallback: Mutex<Result<Vec<RawRecord>, FetchError>>,
    }

    impl ScriptedUpstream {
        pub fn returning(records: Vec<RawRecord>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(Ok(records)),
            }
        }

        pub fn failing(error: FetchError) -> Self {
            Self {
                fallback: Mutex::new(Err(error)),
                ..Self::returning(Vec::new())
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Queue an outcome ahead of the fallback
        pub fn then(self, outcome: Result<Vec<RawRecord>, FetchError>) -> Self {
            self.script.lock().push_back(outcome);
            self
        }

        /// Replace the repeating outcome
        pub fn set_fallback(&self, outcome: Result<Vec<RawRecord>, FetchError>) {
            *self.fallback.lock() = outcome;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamSource for ScriptedUpstream {
        fn source_name(&self) -> &str {
            "scripted"
        }

        async fn fetch_all(&self) -> Result<Vec<RawRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| self.fallback.lock().clone())
        }
    }

    /// Raw keyed record
    pub fn raw(sku: &str, qty: u64, vendor: Option<&str>) -> RawRecord {
        let mut value = json!({ "sku": sku, "name": format!("Item {}", sku), "qty": qty });
        if let Some(vendor) = vendor {
            value["vendor"] = json!(vendor);
        }
        serde_json::from_value(value).unwrap()
    }
}
