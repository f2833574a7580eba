// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duplicate frame detection cache

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::frame::NodeAddress;

/// Default number of `(from, id)` pairs remembered.
pub const DEFAULT_CAPACITY: usize = 256;

/// Cache entry for a delivered frame
#[derive(Debug, Clone, Copy)]
struct SeenEntry {
    /// Frame key (from << 8 | id)
    key: u16,
    /// When the frame was first delivered
    seen_at: Instant,
}

/// Bounded, time-windowed cache of delivered `(from, id)` pairs.
///
/// Entries are kept in insertion order; expired entries are dropped from
/// the front and, when full, the oldest entry is evicted.
#[derive(Debug)]
pub struct DedupeCache {
    entries: VecDeque<SeenEntry>,
    capacity: usize,
    window: Duration,
}

impl DedupeCache {
    /// Create a cache remembering pairs for `window`.
    pub fn new(window: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            window,
        }
    }

    fn key(from: NodeAddress, id: u8) -> u16 {
        (u16::from(from.get()) << 8) | u16::from(id)
    }

    fn expire(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.seen_at) < self.window {
                break;
            }
            self.entries.pop_front();
        }
    }

    #[cfg(test)]
    fn is_duplicate(&self, from: NodeAddress, id: u8) -> bool {
        let key = Self::key(from, id);
        let now = Instant::now();
        self.entries
            .iter()
            .any(|e| e.key == key && now.duration_since(e.seen_at) < self.window)
    }

    /// Check if duplicate and mark as seen if not
    ///
    /// Returns `true` if the pair is a duplicate.
    pub fn check_and_mark(&mut self, from: NodeAddress, id: u8) -> bool {
        let now = Instant::now();
        self.expire(now);

        let key = Self::key(from, id);
        if self.entries.iter().any(|e| e.key == key) {
            return true;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SeenEntry { key, seen_at: now });
        false
    }

    #[cfg(test)]
    fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| now.duration_since(e.seen_at) < self.window)
            .count()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_basic() {
        let mut cache = DedupeCache::new(Duration::from_secs(10), 8);

        assert!(!cache.check_and_mark(NodeAddress(3), 7));
        assert!(cache.check_and_mark(NodeAddress(3), 7));
        assert!(cache.is_duplicate(NodeAddress(3), 7));

        // Same id from another sender is distinct
        assert!(!cache.check_and_mark(NodeAddress(4), 7));
        assert!(!cache.check_and_mark(NodeAddress(3), 8));
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry() {
        let mut cache = DedupeCache::new(Duration::from_secs(10), 8);

        assert!(!cache.check_and_mark(NodeAddress(3), 7));
        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(cache.check_and_mark(NodeAddress(3), 7));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!cache.is_duplicate(NodeAddress(3), 7));
        assert!(!cache.check_and_mark(NodeAddress(3), 7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_evicted() {
        let mut cache = DedupeCache::new(Duration::from_secs(60), 4);

        for id in 0..4 {
            assert!(!cache.check_and_mark(NodeAddress(1), id));
        }
        assert!(!cache.check_and_mark(NodeAddress(1), 4));

        // id 0 was evicted, ids 1-4 are still known
        assert!(!cache.is_duplicate(NodeAddress(1), 0));
        for id in 1..5 {
            assert!(cache.is_duplicate(NodeAddress(1), id));
        }

        cache.clear();
        assert!(cache.is_empty());
    }
}
