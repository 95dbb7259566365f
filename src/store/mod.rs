//! State Store Module
//!
//! Adapters for the remote document store holding durable user state.
//! Every call is a round trip; caching is the state service's job.

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::service::StateKey;

pub use http::HttpDocumentStore;
pub use memory::{MemoryDocumentStore, StoreCalls};

// == Remote Record ==
/// A document as persisted by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

impl RemoteRecord {
    /// Wraps `value`, stamped with the current time.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }
}

// == Remote Store ==
/// Get/put/delete of user state records.
///
/// Implementations report a missing record as `NotFound` and any transport
/// failure as `StoreUnavailable`. `PoolExhausted` may pass through.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// A name for logs, e.g. "http" or "memory".
    fn name(&self) -> &'static str;

    async fn load(&self, key: &StateKey) -> Result<RemoteRecord>;

    /// Upserts the record.
    async fn save(&self, key: &StateKey, record: &RemoteRecord) -> Result<()>;

    /// Removes the record; deleting a missing record succeeds.
    async fn delete(&self, key: &StateKey) -> Result<()>;
}
