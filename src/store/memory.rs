//! In-process document store.
//!
//! Stands in for the remote store when none is configured, and lets tests
//! count round trips and simulate an outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{Result, StateError};
use crate::service::StateKey;
use crate::store::{RemoteRecord, RemoteStore};

/// Round trips made against a [`MemoryDocumentStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub loads: u64,
    pub saves: u64,
    pub deletes: u64,
}

impl StoreCalls {
    pub fn total(&self) -> u64 {
        self.loads + self.saves + self.deletes
    }
}

#[derive(Debug)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<StateKey, RemoteRecord>>,
    available: AtomicBool,
    loads: AtomicU64,
    saves: AtomicU64,
    deletes: AtomicU64,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            loads: AtomicU64::new(0),
            saves: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Simulates the store going down (`false`) or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            loads: self.loads.load(Ordering::SeqCst),
            saves: self.saves.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }

    /// Seeds a record without counting a call.
    pub fn insert(&self, key: StateKey, value: Value) {
        self.records.write().insert(key, RemoteRecord::new(value));
    }

    /// Reads a record without counting a call.
    pub fn record(&self, key: &StateKey) -> Option<RemoteRecord> {
        self.records.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StateError::StoreUnavailable(
                "memory store switched off".to_string(),
            ))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryDocumentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &StateKey) -> Result<RemoteRecord> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.record(key)
            .ok_or_else(|| StateError::NotFound(key.to_string()))
    }

    async fn save(&self, key: &StateKey, record: &RemoteRecord) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.records.write().insert(key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.records.write().remove(key);
        Ok(())
    }
}
