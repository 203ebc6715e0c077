//! Redis Storage
//!
//! Shared key-value store for multi-replica deployments. The connection is
//! established on first use and re-established by the connection manager
//! after a drop, so a Redis outage at startup does not prevent the service
//! from booting.

use crate::domain::KeyValueStore;
use crate::error::{Error, Result};
use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

// =============================================================================
// Redis Storage Configuration
// =============================================================================

/// Configuration for Redis storage
#[derive(Debug, Clone)]
pub struct RedisStorageConfig {
    /// Connection URL (`redis://` or `rediss://`)
    pub url: String,
    /// Optional namespace prepended to every key
    pub key_namespace: Option<String>,
}

impl Default for RedisStorageConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_namespace: None,
        }
    }
}

// =============================================================================
// Redis Storage
// =============================================================================

/// Redis-backed store
pub struct RedisStorage {
    config: RedisStorageConfig,
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisStorage {
    /// Create the store; no connection is made until the first operation
    pub fn with_config(config: RedisStorageConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| Error::Configuration(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            config,
            client,
            connection: Mutex::new(None),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        match &self.config.key_namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }

    async fn connection(&self, operation: &'static str) -> Result<ConnectionManager> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(|e| map_redis_error(operation, e))?;
        info!(backend = "redis", "Connected to Redis");
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

fn map_redis_error(operation: &'static str, error: RedisError) -> Error {
    Error::store(operation, error.to_string())
}

#[async_trait]
impl KeyValueStore for RedisStorage {
    fn backend_name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.connection("get").await?;
        let value: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("get", e))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, retention: Option<Duration>) -> Result<()> {
        let mut conn = self.connection("set").await?;
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(self.namespaced(key)).arg(value.as_ref());
        if let Some(retention) = retention {
            cmd.arg("EX").arg(retention.as_secs().max(1));
        }

        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| map_redis_error("set", e))?;
        debug!(key = %key, bytes = value.len(), "Stored value in Redis");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection("delete").await?;
        let removed: u64 = ::redis::cmd("DEL")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("delete", e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection("exists").await?;
        let count: u64 = ::redis::cmd("EXISTS")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("exists", e))?;
        Ok(count > 0)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection("ping").await?;
        let pong: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("ping", e))?;
        Ok(pong == "PONG")
    }
}
