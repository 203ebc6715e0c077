//! Cache Events
//!
//! Events emitted by the cache service for monitoring and observability.

use crate::cache::entry::{CacheKey, SourceState};
use serde::{Deserialize, Serialize};

/// Events emitted by the cache service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Fresh envelope served from the store
    Hit {
        key: String,
        age_seconds: u64,
    },

    /// Store had no fresh envelope for the key
    Miss {
        key: String,
        /// An expired envelope was present
        stale_present: bool,
    },

    /// Upstream refresh started
    FetchStarted {
        key: String,
    },

    /// Upstream refresh stored a new envelope
    FetchCompleted {
        key: String,
        records: usize,
        duration_ms: u64,
    },

    /// Upstream refresh failed
    FetchFailed {
        key: String,
        kind: String,
        error: String,
    },

    /// Expired envelope served after a failed refresh
    StaleServed {
        key: String,
        age_seconds: u64,
    },

    /// Store operation failed or timed out
    StoreUnavailable {
        operation: String,
        reason: String,
    },

    /// Cache keys deleted by a clear
    Cleared {
        keys_removed: usize,
    },
}

impl CacheEvent {
    /// Create a Hit event
    pub fn hit(key: &CacheKey, age_seconds: u64) -> Self {
        CacheEvent::Hit {
            key: key.to_storage_key(),
            age_seconds,
        }
    }

    /// Create a Miss event
    pub fn miss(key: &CacheKey, stale_present: bool) -> Self {
        CacheEvent::Miss {
            key: key.to_storage_key(),
            stale_present,
        }
    }

    /// Create a FetchStarted event
    pub fn fetch_started(key: &CacheKey) -> Self {
        CacheEvent::FetchStarted {
            key: key.to_storage_key(),
        }
    }

    /// Create a FetchCompleted event
    pub fn fetch_completed(key: &CacheKey, records: usize, duration_ms: u64) -> Self {
        CacheEvent::FetchCompleted {
            key: key.to_storage_key(),
            records,
            duration_ms,
        }
    }

    /// Create a FetchFailed event
    pub fn fetch_failed(key: &CacheKey, error: &crate::error::FetchError) -> Self {
        CacheEvent::FetchFailed {
            key: key.to_storage_key(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }

    /// Create the event describing a served envelope
    pub fn served(key: &CacheKey, state: SourceState, age_seconds: u64) -> Self {
        match state {
            SourceState::Fresh => Self::hit(key, age_seconds),
            SourceState::StaleFallback => CacheEvent::StaleServed {
                key: key.to_storage_key(),
                age_seconds,
            },
        }
    }

    /// Get the key associated with this event (if any)
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Hit { key, .. } => Some(key),
            CacheEvent::Miss { key, .. } => Some(key),
            CacheEvent::FetchStarted { key } => Some(key),
            CacheEvent::FetchCompleted { key, .. } => Some(key),
            CacheEvent::FetchFailed { key, .. } => Some(key),
            CacheEvent::StaleServed { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CacheEvent::FetchFailed { .. } | CacheEvent::StoreUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_event_creation() {
        let key = CacheKey::vendor("Acme");

        let hit = CacheEvent::hit(&key, 12);
        assert_eq!(hit.key(), Some("inventory:vendor:Acme"));
        assert!(!hit.is_error());

        let failed = CacheEvent::fetch_failed(&key, &FetchError::AuthFailure { status: 401 });
        assert!(failed.is_error());
        assert!(matches!(
            &failed,
            CacheEvent::FetchFailed { kind, .. } if kind == "upstream_auth_failure"
        ));

        let cleared = CacheEvent::Cleared { keys_removed: 2 };
        assert_eq!(cleared.key(), None);
    }

    #[test]
    fn test_served_event_reflects_state() {
        let key = CacheKey::All;

        assert_eq!(
            CacheEvent::served(&key, SourceState::Fresh, 5),
            CacheEvent::hit(&key, 5)
        );
        assert!(matches!(
            CacheEvent::served(&key, SourceState::StaleFallback, 900),
            CacheEvent::StaleServed { age_seconds: 900, .. }
        ));
    }
}
