// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The two bounded queues the scheduler is built from.
//!
//! [`ReadyQueue`] is the one structure that may be pushed to from interrupt
//! context (a hardware edge waking a [`crate::sync::PinEvent`], or a task's
//! own [`core::task::Waker`] firing). [`WaitQueue`] is touched only by the
//! cooperative run loop and needs no synchronization of its own.

use crate::time::Instant;
use alloc::collections::{BinaryHeap, VecDeque};
use core::cmp::Ordering;
use spin::Mutex;

/// A bounded FIFO safe to [`ReadyQueue::put`] from interrupt context and
/// [`ReadyQueue::pop`] from exactly one cooperative consumer.
///
/// Guarded by a short-held spinlock rather than a true lock-free ring
/// buffer; see `DESIGN.md` for why that tradeoff was made here.
pub struct ReadyQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> ReadyQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueues `item`. Returns `false` without blocking if the queue is at
    /// capacity; callers are expected to treat that as a configuration
    /// error rather than retry from interrupt context.
    pub fn put(&self, item: T) -> bool {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(item);
        true
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct WaitEntry<T> {
    at: Instant,
    value: T,
}

impl<T> PartialEq for WaitEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl<T> Eq for WaitEntry<T> {}

impl<T> PartialOrd for WaitEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for WaitEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap`, a max-heap, pops the earliest deadline.
        other.at.cmp(&self.at)
    }
}

/// A bounded min-heap of `(wake_time, value)` pairs ordered by wrap-safe
/// deadline. Touched only from the cooperative run loop.
pub struct WaitQueue<T> {
    inner: BinaryHeap<WaitEntry<T>>,
    capacity: usize,
}

impl<T> WaitQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BinaryHeap::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns `false` without inserting if the queue is at capacity.
    pub fn push(&mut self, at: Instant, value: T) -> bool {
        if self.inner.len() >= self.capacity {
            return false;
        }
        self.inner.push(WaitEntry { at, value });
        true
    }

    #[must_use]
    pub fn earliest(&self) -> Option<Instant> {
        self.inner.peek().map(|entry| entry.at)
    }

    /// Pops and returns the earliest entry if its deadline has passed,
    /// leaving the queue untouched otherwise.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        if now.is_before(self.inner.peek()?.at) {
            return None;
        }
        self.inner.pop().map(|entry| entry.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_queue_is_fifo_and_bounded() {
        let q = ReadyQueue::new(2);
        assert!(q.put(1));
        assert!(q.put(2));
        assert!(!q.put(3));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn wait_queue_pops_earliest_due_entry() {
        let mut q = WaitQueue::new(4);
        assert!(q.push(Instant(300), "late"));
        assert!(q.push(Instant(100), "early"));
        assert!(q.push(Instant(200), "mid"));
        assert_eq!(q.pop_due(Instant(50)), None);
        assert_eq!(q.pop_due(Instant(150)), Some("early"));
        assert_eq!(q.pop_due(Instant(150)), None);
        assert_eq!(q.pop_due(Instant(1000)), Some("mid"));
        assert_eq!(q.pop_due(Instant(1000)), Some("late"));
    }

    #[test]
    fn wait_queue_respects_wraparound() {
        let mut q = WaitQueue::new(2);
        q.push(Instant(u32::MAX - 5), "near-wrap");
        q.push(Instant(10), "after-wrap");
        assert_eq!(q.pop_due(Instant(u32::MAX)), Some("near-wrap"));
        assert_eq!(q.pop_due(Instant(20)), Some("after-wrap"));
    }
}
