//! Broadcast heap - min-priority queue with O(1) "add to all"
//!
//! Values are stored relative to a running base offset. [`BroadcastHeap::add_all`]
//! only moves the offset, so a water-filling loop that lowers every queued
//! value by the same step and then pops whoever reached zero costs
//! O(n log n) overall instead of O(n) per step.
//!
//! Entries with equal values pop in insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Debug)]
struct Entry<K> {
    value: i64,
    seq: u64,
    key: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.seq == other.seq
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap over `(key, value)` pairs with a lazily applied broadcast delta
#[derive(Debug)]
pub struct BroadcastHeap<K> {
    heap: BinaryHeap<Reverse<Entry<K>>>,
    base: i64,
    next_seq: u64,
}

impl<K> Default for BroadcastHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> BroadcastHeap<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            base: 0,
            next_seq: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            base: 0,
            next_seq: 0,
        }
    }

    /// Queue `key` with the given absolute value
    pub fn push(&mut self, key: K, value: i64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            value: value - self.base,
            seq,
            key,
        }));
    }

    /// Remove and return the entry with the smallest value
    pub fn pop(&mut self) -> Option<(K, i64)> {
        let base = self.base;
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.key, entry.value + base))
    }

    /// Smallest queued value
    pub fn peek_min(&self) -> Option<i64> {
        self.heap.peek().map(|Reverse(entry)| entry.value + self.base)
    }

    /// Add `delta` to every value currently queued
    #[inline]
    pub fn add_all(&mut self, delta: i64) {
        self.base += delta;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Heap value for a block count
///
/// # Panics
///
/// Panics if `blocks` does not fit in an `i64`. Callers clamp per-tenant
/// counts to the supply being filled before queueing them.
pub fn block_key(blocks: u64) -> i64 {
    i64::try_from(blocks).expect("block count exceeds i64::MAX")
}
