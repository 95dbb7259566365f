//! State Cache - per-user state with a bounded TTL cache in front of a remote
//! document store
//!
//! Reads are served from memory and fall back to the store; critical writes
//! are written through, everything else stays in the cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod service;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::BoundedTtlCache;
pub use config::Config;
pub use error::{Result, StateError};
pub use pool::{ConnectionPool, PoolConfig, RetryPolicy};
pub use service::{Namespace, PersistencePolicy, StateCategory, StateKey, StateService};
pub use store::{HttpDocumentStore, MemoryDocumentStore, RemoteStore};
pub use tasks::spawn_sweep_task;
