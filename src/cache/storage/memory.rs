//! In-Memory Storage
//!
//! Process-local key-value store using DashMap for concurrent access.

use crate::domain::KeyValueStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Memory Storage Configuration
// =============================================================================

/// Configuration for memory storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageConfig {
    /// Number of shards for DashMap (0 = auto)
    pub shard_count: usize,
}

// =============================================================================
// Memory Storage
// =============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store backed by DashMap
pub struct MemoryStorage {
    entries: DashMap<String, StoredValue>,
    /// Total bytes currently held
    size_bytes: AtomicU64,
    /// Simulated reachability, for outage drills
    available: AtomicBool,
}

impl MemoryStorage {
    /// Create new memory storage with default config
    pub fn new() -> Self {
        Self::with_config(MemoryStorageConfig::default())
    }

    /// Create new memory storage with full config
    pub fn with_config(config: MemoryStorageConfig) -> Self {
        let entries = if config.shard_count > 0 {
            DashMap::with_shard_amount(config.shard_count)
        } else {
            DashMap::new()
        };

        Self {
            entries,
            size_bytes: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Mark the store reachable or unreachable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Check if available
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Get current entry count (including expired, not yet purged entries)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get total stored bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    fn ensure_available(&self, operation: &'static str) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::store(operation, "memory store marked unavailable"))
        }
    }

    fn remove_entry(&self, key: &str) -> Option<StoredValue> {
        let (_, removed) = self.entries.remove(key)?;
        self.size_bytes
            .fetch_sub(removed.bytes.len() as u64, Ordering::Relaxed);
        Some(removed)
    }

    /// Live value for `key`, purging it when its retention has passed
    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = Instant::now();
        let value = self.entries.get(key).map(|r| r.value().clone())?;
        if value.is_expired(now) {
            self.purge_expired(key, now);
            None
        } else {
            Some(value)
        }
    }

    /// Remove `key` only if the value stored right now is expired at `now`.
    /// A value written after the expiry check survives.
    fn purge_expired(&self, key: &str, now: Instant) -> bool {
        match self.entries.remove_if(key, |_, value| value.is_expired(now)) {
            Some((_, removed)) => {
                self.size_bytes
                    .fetch_sub(removed.bytes.len() as u64, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.ensure_available("get")?;
        Ok(self.live(key).map(|v| v.bytes))
    }

    async fn set(&self, key: &str, value: Bytes, retention: Option<Duration>) -> Result<()> {
        self.ensure_available("set")?;

        let new_size = value.len() as u64;
        let stored = StoredValue {
            bytes: value,
            expires_at: retention.map(|r| Instant::now() + r),
        };

        match self.entries.insert(key.to_string(), stored) {
            Some(old) => {
                let old_size = old.bytes.len() as u64;
                if new_size > old_size {
                    self.size_bytes.fetch_add(new_size - old_size, Ordering::Relaxed);
                } else {
                    self.size_bytes.fetch_sub(old_size - new_size, Ordering::Relaxed);
                }
            }
            None => {
                self.size_bytes.fetch_add(new_size, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_available("delete")?;
        Ok(self.remove_entry(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_available("exists")?;
        Ok(self.live(key).is_some())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.is_available())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let storage = MemoryStorage::new();

        storage
            .set("inventory:all", Bytes::from_static(b"hello world"), None)
            .await
            .unwrap();
        assert_eq!(storage.entry_count(), 1);
        assert_eq!(storage.size_bytes(), 11);

        let value = storage.get("inventory:all").await.unwrap().unwrap();
        assert_eq!(value.as_ref(), b"hello world");

        assert!(storage.exists("inventory:all").await.unwrap());
        assert!(!storage.exists("inventory:vendor:none").await.unwrap());

        assert!(storage.delete("inventory:all").await.unwrap());
        assert!(!storage.delete("inventory:all").await.unwrap());
        assert_eq!(storage.entry_count(), 0);
        assert_eq!(storage.size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_replace_adjusts_size() {
        let storage = MemoryStorage::new();

        storage.set("k", Bytes::from_static(b"short"), None).await.unwrap();
        assert_eq!(storage.size_bytes(), 5);

        storage
            .set("k", Bytes::from_static(b"much longer data here"), None)
            .await
            .unwrap();
        assert_eq!(storage.size_bytes(), 21);
        assert_eq!(storage.entry_count(), 1);

        storage.set("k", Bytes::from_static(b"x"), None).await.unwrap();
        assert_eq!(storage.size_bytes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_expiry() {
        let storage = MemoryStorage::new();

        storage
            .set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(storage.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(storage.get("k").await.unwrap().is_none());
        assert_eq!(storage.entry_count(), 0);
        assert_eq!(storage.size_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_spares_value_written_after_expiry_check() {
        let storage = MemoryStorage::new();
        storage
            .set("k", Bytes::from_static(b"old"), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        let checked_at = Instant::now();

        // A refresh lands between a reader's expiry check and its purge
        storage
            .set("k", Bytes::from_static(b"fresh value"), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(!storage.purge_expired("k", checked_at));
        assert_eq!(storage.get("k").await.unwrap().unwrap().as_ref(), b"fresh value");
        assert_eq!(storage.size_bytes(), 11);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let storage = MemoryStorage::new();
        storage.set("k", Bytes::from_static(b"v"), None).await.unwrap();

        storage.set_available(false);
        assert!(matches!(
            storage.get("k").await,
            Err(Error::StoreUnavailable { operation: "get", .. })
        ));
        assert!(storage.set("k", Bytes::new(), None).await.is_err());
        assert!(!storage.health_check().await.unwrap());

        storage.set_available(true);
        assert!(storage.get("k").await.unwrap().is_some());
    }
}
