//! Response DTOs for the state API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::service::{Namespace, StateCategory, StateKey};

/// Response body for `GET /state/:namespace/:user_id`
#[derive(Debug, Clone, Serialize)]
pub struct GetStateResponse {
    pub namespace: Namespace,
    pub user_id: String,
    pub value: Value,
}

impl GetStateResponse {
    pub fn new(key: &StateKey, value: Value) -> Self {
        Self {
            namespace: key.namespace(),
            user_id: key.user_id().to_string(),
            value,
        }
    }
}

/// Response body for writes (`PUT` and `DELETE /state/...`)
#[derive(Debug, Clone, Serialize)]
pub struct SetStateResponse {
    pub namespace: Namespace,
    pub user_id: String,
    pub category: StateCategory,
    /// True once the remote store holds the write
    pub persisted: bool,
    pub message: String,
}

impl SetStateResponse {
    pub fn saved(key: &StateKey, category: StateCategory) -> Self {
        let persisted = category == StateCategory::Critical;
        let message = if persisted {
            format!("State '{}' saved", key)
        } else {
            format!("State '{}' cached", key)
        };
        Self {
            namespace: key.namespace(),
            user_id: key.user_id().to_string(),
            category,
            persisted,
            message,
        }
    }

    /// A critical write that is visible but not yet durable.
    pub fn deferred(key: &StateKey, reason: impl Into<String>) -> Self {
        Self {
            namespace: key.namespace(),
            user_id: key.user_id().to_string(),
            category: StateCategory::Critical,
            persisted: false,
            message: reason.into(),
        }
    }
}

/// Response body for `DELETE /cache/:namespace/:user_id`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub namespace: Namespace,
    pub user_id: String,
    /// Whether an entry was cached
    pub invalidated: bool,
}

impl InvalidateResponse {
    pub fn new(key: &StateKey, invalidated: bool) -> Self {
        Self {
            namespace: key.namespace(),
            user_id: key.user_id().to_string(),
            invalidated,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of LRU evictions
    pub evictions: u64,
    /// Number of entries dropped for being idle
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}
