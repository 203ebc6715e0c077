//! Cache Storage Backends
//!
//! [`KeyValueStore`](crate::domain::KeyValueStore) implementations selected by
//! `store.connectionString`.

mod memory;
mod redis;

pub use self::memory::{MemoryStorage, MemoryStorageConfig};
pub use self::redis::{RedisStorage, RedisStorageConfig};

use crate::domain::KeyValueStoreRef;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Connection string selecting the in-process store
pub const MEMORY_CONNECTION_STRING: &str = "memory://";

/// Build the store named by a connection string.
///
/// `memory://` (or an empty string) selects [`MemoryStorage`];
/// `redis://` and `rediss://` select [`RedisStorage`], with keys prefixed by
/// `key_namespace` when one is given. Redis connects lazily, so an
/// unreachable server does not fail start-up.
pub fn from_connection_string(
    connection_string: &str,
    key_namespace: Option<&str>,
) -> Result<KeyValueStoreRef> {
    let trimmed = connection_string.trim();

    if trimmed.is_empty() || trimmed.starts_with("memory://") {
        return Ok(Arc::new(MemoryStorage::new()));
    }

    if trimmed.starts_with("redis://") || trimmed.starts_with("rediss://") {
        let storage = RedisStorage::with_config(redis_config(trimmed, key_namespace))?;
        return Ok(Arc::new(storage));
    }

    Err(Error::Configuration(format!(
        "Unsupported store connection string: {}",
        trimmed
    )))
}

fn redis_config(url: &str, key_namespace: Option<&str>) -> RedisStorageConfig {
    RedisStorageConfig {
        url: url.to_string(),
        key_namespace: key_namespace
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection() {
        assert_eq!(from_connection_string("", None).unwrap().backend_name(), "memory");
        assert_eq!(
            from_connection_string(MEMORY_CONNECTION_STRING, Some("ignored"))
                .unwrap()
                .backend_name(),
            "memory"
        );
        assert_eq!(
            from_connection_string("redis://127.0.0.1:6379/0", Some("staging"))
                .unwrap()
                .backend_name(),
            "redis"
        );
        assert!(matches!(
            from_connection_string("postgres://localhost/db", None),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_redis_namespace() {
        let config = redis_config("redis://cache:6379", Some("staging"));
        assert_eq!(config.key_namespace.as_deref(), Some("staging"));

        assert_eq!(redis_config("redis://cache:6379", Some("  ")).key_namespace, None);
        assert_eq!(redis_config("redis://cache:6379", None).key_namespace, None);
    }
}
