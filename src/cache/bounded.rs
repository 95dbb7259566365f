//! Bounded TTL Cache Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and idle
//! TTL expiration behind a single mutex.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats, LruTracker};

// == Inner State ==
/// Everything the lock guards: the map, the recency index and the counters.
///
/// Access timestamps are read while the lock is held, so recency order and
/// `last_access` order always agree.
#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    lru: LruTracker<K>,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(entry.access_seq);
        Some(entry)
    }

    fn touch(&mut self, key: &K, now: Instant) -> Option<&CacheEntry<V>> {
        let seq = self.lru.next_seq();
        let entry = self.entries.get_mut(key)?;
        let previous = entry.access_seq;
        entry.touch(seq, now);
        self.lru.record(key.clone(), seq, Some(previous));
        self.entries.get(key)
    }
}

// == Bounded TTL Cache ==
/// Thread-safe key/value cache bounded by both capacity and idle time.
///
/// - Capacity: inserting a new key into a full cache evicts the least
///   recently used entry first, expired or not.
/// - Idle TTL: an entry not read or written for longer than `ttl` is never
///   returned. Expiry is lazy (checked on access) unless [`sweep`] is called.
///
/// All structural changes happen under one short-lived lock; nothing in
/// here blocks on I/O.
///
/// [`sweep`]: BoundedTtlCache::sweep
#[derive(Debug)]
pub struct BoundedTtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache holding at most `max_entries` entries (clamped to 1),
    /// each expiring after `ttl` of inactivity (`None` = never).
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                stats: CacheStats::new(),
            }),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    // == Get ==
    /// Returns the cached value and marks it most recently used.
    ///
    /// An entry idle for longer than the TTL is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(self.ttl, now),
            None => {
                inner.stats.record_lookup(false);
                return None;
            }
        };

        if expired {
            inner.remove(key);
            inner.stats.record_expirations(1);
            inner.stats.record_lookup(false);
            return None;
        }

        let value = inner.touch(key, now).map(|entry| entry.value.clone());
        inner.stats.record_lookup(true);
        value
    }

    // == Put ==
    /// Inserts or replaces a value, marking it most recently used.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn put(&self, key: K, value: V) -> Option<K> {
        let mut guard = self.inner.lock();
        let now = Instant::now();
        self.insert_locked(&mut guard, key, value, now)
    }

    // == Insert If Absent ==
    /// Inserts `value` unless a live entry already exists.
    ///
    /// Returns whichever value ends up cached. Used to populate the cache from
    /// a slower source without clobbering a write that landed meanwhile.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        self.get_or_insert_with(key, || value)
    }

    // == Get Or Insert With ==
    /// Returns the live value for `key`, or caches and returns `make()`.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = Instant::now();

        match inner.entries.get(&key).map(|e| e.is_expired(self.ttl, now)) {
            Some(false) => {
                if let Some(entry) = inner.touch(&key, now) {
                    return entry.value.clone();
                }
            }
            Some(true) => {
                inner.remove(&key);
                inner.stats.record_expirations(1);
            }
            None => {}
        }

        let value = make();
        self.insert_locked(inner, key, value.clone(), now);
        value
    }

    // == Invalidate ==
    /// Removes the entry unconditionally. Returns whether it was present.
    pub fn invalidate(&self, key: &K) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    // == Sweep ==
    /// Removes every entry idle for longer than the TTL.
    ///
    /// Entries are visited oldest first and the walk stops at the first live
    /// one: recency order is also last-access order.
    pub fn sweep(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = Instant::now();
        let mut removed = 0;

        while let Some((seq, key)) = inner.lru.peek_oldest() {
            let expired = inner
                .entries
                .get(key)
                .map_or(true, |entry| entry.is_expired(Some(ttl), now));
            if !expired {
                break;
            }
            if let Some(key) = inner.lru.remove(seq) {
                inner.entries.remove(&key);
            }
            removed += 1;
        }

        inner.stats.record_expirations(removed);
        removed
    }

    // == Contains ==
    /// Checks for a live entry without touching its recency.
    pub fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        let now = Instant::now();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.ttl, now))
    }

    // == Keys ==
    /// Returns the cached keys ordered from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().lru.iter().cloned().collect()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.entries.len();
        stats
    }

    // == Length ==
    /// Returns the current number of entries, expired-but-unswept included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn insert_locked(&self, inner: &mut Inner<K, V>, key: K, value: V, now: Instant) -> Option<K> {
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            inner.touch(&key, now);
            return None;
        }

        let mut evicted = None;
        if inner.entries.len() >= self.max_entries {
            if let Some(oldest) = inner.lru.evict_oldest() {
                inner.entries.remove(&oldest);
                inner.stats.record_eviction();
                evicted = Some(oldest);
            }
        }

        let seq = inner.lru.next_seq();
        inner.entries.insert(key.clone(), CacheEntry::new(value, seq, now));
        inner.lru.record(key, seq, None);
        evicted
    }
}
