//! Cache counters
//!
//! Lookup and removal counts for a [`BoundedTtlCache`](super::BoundedTtlCache).
//! Counters are cumulative; `total_entries` is filled in when a snapshot is
//! taken.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from memory
    pub hits: u64,
    /// Lookups that found nothing live, expired entries included
    pub misses: u64,
    /// Entries pushed out to stay within capacity
    pub evictions: u64,
    /// Entries dropped for being idle longer than the TTL
    pub expirations: u64,
    /// Live entries at snapshot time
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / lookups`, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }

    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}
