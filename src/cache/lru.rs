//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::BTreeMap;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Keys are indexed by a strictly increasing access sequence:
/// - First = least recently used
/// - Last = most recently used
///
/// Since sequences never repeat, two keys can't tie; the one accessed (or
/// inserted) earlier always comes first.
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Access sequence -> key
    order: BTreeMap<u64, K>,
    /// Next sequence number to hand out
    next_seq: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    // == Next Sequence ==
    /// Reserves the next access sequence number.
    pub fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // == Record ==
    /// Records `key` as most recently used under `seq`.
    ///
    /// `previous` is the sequence the key was tracked under before, if any.
    pub fn record(&mut self, key: K, seq: u64, previous: Option<u64>) {
        if let Some(prev) = previous {
            self.order.remove(&prev);
        }
        self.order.insert(seq, key);
    }

    // == Remove ==
    /// Stops tracking the key stored under `seq`.
    pub fn remove(&mut self, seq: u64) -> Option<K> {
        self.order.remove(&seq)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key and its sequence without removing it.
    pub fn peek_oldest(&self) -> Option<(u64, &K)> {
        self.order.first_key_value().map(|(seq, key)| (*seq, key))
    }

    // == Iterate ==
    /// Iterates keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
