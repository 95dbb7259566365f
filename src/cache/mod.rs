//! Cache Module
//!
//! Provides a generic in-memory cache with idle TTL expiration and LRU
//! eviction.

mod bounded;
mod entry;
mod lru;
mod stats;


// Re-export public types
pub use bounded::BoundedTtlCache;
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
