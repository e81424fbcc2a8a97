//! A bounded, power-of-two ring buffer of fixed-width integers with strong
//! corruption detection, ported from the source's `ringq.c`.
//!
//! Unlike the teacher's lock-free `Ring<T>` (built for a hot SPSC path where
//! the whole point is avoiding a mutex), this ring buffer keeps the source's
//! honest `lock` field as a real `Mutex`: the data model here is intended to
//! be defensive and self-checking rather than maximally fast, and the
//! per-slot guard pattern plus running checksum only make sense if every
//! mutation funnels through one critical section.

use std::sync::Mutex;

use crate::invariants::{
    debug_assert_empty_checksum_zero, debug_assert_guard_matches, debug_assert_pops_le_pushes,
};
use crate::metrics::RingqMetrics;

/// Sentinel written into a slot's guard word on push and checked on pop.
const GUARD_SENTINEL: u32 = 0xA5A5;

struct Inner {
    buf: Vec<u32>,
    guard: Vec<u32>,
    head: usize,
    tail: usize,
    debug_sum: u64,
    debug_last_seq: u32,
    cumulative_pushed: u64,
    cumulative_popped: u64,
}

/// A bounded FIFO of `u32` values with capacity `cap` (a power of two,
/// usable capacity `cap - 1`).
pub struct RingQ {
    cap: usize,
    mask: usize,
    inner: Mutex<Inner>,
    metrics: RingqMetrics,
}

impl RingQ {
    /// Creates a new, empty ring with the given capacity.
    ///
    /// # Panics
    /// Panics if `cap` is not a power of two.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        assert!(cap.is_power_of_two(), "RingQ capacity must be a power of two");
        Self {
            cap,
            mask: cap - 1,
            inner: Mutex::new(Inner {
                buf: vec![0; cap],
                guard: vec![0; cap],
                head: 0,
                tail: 0,
                debug_sum: 0,
                debug_last_seq: 0,
                cumulative_pushed: 0,
                cumulative_popped: 0,
            }),
            metrics: RingqMetrics::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[must_use]
    pub fn metrics(&self) -> &RingqMetrics {
        &self.metrics
    }

    /// Appends `v`. Returns `false` (without mutating) if the ring is full.
    pub fn push(&self, v: u32) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let next_head = (inner.head + 1) & self.mask;
        if next_head == inner.tail {
            self.metrics.push_failures.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return false;
        }

        let head = inner.head;
        inner.buf[head] = v;
        inner.guard[head] = GUARD_SENTINEL;
        inner.head = next_head;
        inner.debug_sum += u64::from(v);
        inner.debug_last_seq = v;
        inner.cumulative_pushed += 1;

        self.metrics.pushed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        true
    }

    /// Removes and returns the oldest value, or `None` if the ring is empty.
    pub fn pop(&self) -> Option<u32> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.head == inner.tail {
            self.metrics.pop_failures.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        }

        let tail = inner.tail;
        let guard = inner.guard[tail];
        debug_assert_guard_matches!(guard, GUARD_SENTINEL, tail);

        let v = inner.buf[tail];
        inner.guard[tail] = 0;
        inner.tail = (tail + 1) & self.mask;
        inner.debug_sum -= u64::from(v);
        inner.cumulative_popped += 1;

        let is_empty = inner.head == inner.tail;
        debug_assert_empty_checksum_zero!(is_empty, inner.debug_sum);
        debug_assert_pops_le_pushes!(inner.cumulative_pushed, inner.cumulative_popped);

        self.metrics.popped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(v)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.head.wrapping_sub(inner.tail) & self.mask
    }

    #[must_use]
    pub fn space_free(&self) -> usize {
        self.cap - 1 - self.count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() == self.cap - 1
    }

    /// The most recently pushed value, for diagnostics, as the source's
    /// `debug_last_seq` exposes.
    #[must_use]
    pub fn debug_last_seq(&self) -> u32 {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).debug_last_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_pop_fails() {
        let q = RingQ::new(8);
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_then_pop_preserves_order() {
        let q = RingQ::new(8);
        for v in 1..=5 {
            assert!(q.push(v));
        }
        for v in 1..=5 {
            assert_eq!(q.pop(), Some(v));
        }
        assert!(q.is_empty());
        assert_eq!(q.debug_last_seq(), 5);
    }

    #[test]
    fn full_queue_rejects_push() {
        let q = RingQ::new(4);
        assert!(q.push(1));
        assert!(q.push(2));
        assert!(q.push(3));
        // one slot reserved: cap=4 usable capacity is 3
        assert!(q.is_full());
        assert!(!q.push(4));
    }

    #[test]
    fn wrap_scenario_matches_spec_example_6() {
        let q = RingQ::new(8);
        for v in 1..=7 {
            assert!(q.push(v));
        }
        for expected in 1..=4 {
            assert_eq!(q.pop(), Some(expected));
        }
        for v in 8..=11 {
            assert!(q.push(v));
        }
        for expected in 5..=11 {
            assert_eq!(q.pop(), Some(expected));
        }
        assert_eq!(q.count(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn count_and_space_free_track_head_tail() {
        let q = RingQ::new(8);
        assert_eq!(q.space_free(), 7);
        q.push(1);
        q.push(2);
        assert_eq!(q.count(), 2);
        assert_eq!(q.space_free(), 5);
        q.pop();
        assert_eq!(q.count(), 1);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_capacity() {
        let _ = RingQ::new(100);
    }
}
