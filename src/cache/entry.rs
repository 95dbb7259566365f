//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with idle-time tracking.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and recency metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Last time the entry was read or written
    pub last_access: Instant,
    /// Sequence number of the most recent access (recency index key)
    pub access_seq: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the given sequence number.
    pub fn new(value: V, seq: u64, now: Instant) -> Self {
        Self {
            value,
            last_access: now,
            access_seq: seq,
        }
    }

    // == Touch ==
    /// Marks the entry as accessed at `now` with a fresh access sequence.
    pub fn touch(&mut self, seq: u64, now: Instant) {
        self.last_access = now;
        self.access_seq = seq;
    }

    // == Idle ==
    /// Returns how long the entry has gone without access.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    // == Is Expired ==
    /// Checks if the entry has been idle for longer than `ttl`.
    ///
    /// An entry idle for exactly `ttl` is still live; `None` never expires.
    pub fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        match ttl {
            Some(ttl) => self.idle(now) > ttl,
            None => false,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let now = Instant::now();
        let entry = CacheEntry::new("value", 7, now);

        assert_eq!(entry.value, "value");
        assert_eq!(entry.access_seq, 7);
        assert!(!entry.is_expired(Some(Duration::from_secs(1)), now));
    }

    #[test]
    fn test_entry_never_expires_without_ttl() {
        let now = Instant::now();
        let entry = CacheEntry::new(1u32, 0, now);

        assert!(!entry.is_expired(None, now + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry::new(1u32, 0, now);
        let ttl = Some(Duration::from_secs(10));

        assert!(!entry.is_expired(ttl, now + Duration::from_secs(10)));
        assert!(entry.is_expired(ttl, now + Duration::from_millis(10_001)));
    }

    #[test]
    fn test_touch_resets_idle_and_advances_sequence() {
        let now = Instant::now();
        let mut entry = CacheEntry::new(1u32, 3, now);
        let later = now + Duration::from_secs(5);

        entry.touch(9, later);

        assert_eq!(entry.idle(later), Duration::ZERO);
        assert_eq!(entry.access_seq, 9);
    }
}
