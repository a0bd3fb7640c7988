use crate::invariants::{
    debug_assert_bounded_count, debug_assert_cell_sequence, debug_assert_head_not_past_tail,
    debug_assert_monotonic,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::raw_ring::{CachePadded, RawRing};
use crate::{clamped_len, rounded_capacity, QueueError, RingQueue};
use std::sync::atomic::{AtomicU64, Ordering};

/// Single-producer, single-consumer ring queue — `spec.md` §4.3.
///
/// Both `offer` and `poll` are wait-free: neither ever CAS-retries, because
/// `tail` is written only by the (sole) producer and `head` only by the
/// (sole) consumer. Cross-thread visibility is carried entirely by the
/// release/acquire pair on each cell's sequence number.
///
/// The one-producer/one-consumer assumption is a caller contract, not
/// something this type can check: two threads calling `offer` concurrently
/// (or two calling `poll` concurrently) is undefined behavior for the
/// protocol, though not for Rust's memory safety — see `spec.md` §4.3
/// "Assumptions".
pub struct SpscQueue<T> {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    ring: RawRing<T>,
    metrics: Metrics,
}

// Safety: the SPSC protocol hands `value` access to exactly one thread at a
// time (producer until release, consumer until advance); `T: Send` is all
// that's required to move ownership across the producer/consumer boundary.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
    /// Creates a queue whose realized capacity is `requested` rounded up to
    /// the next power of two (minimum 1). Returns
    /// [`QueueError::InvalidCapacity`] if `requested` is zero.
    pub fn with_capacity(requested: usize) -> Result<Self, QueueError> {
        let capacity = rounded_capacity(requested)?;
        Ok(Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            ring: RawRing::with_capacity(capacity),
            metrics: Metrics::new(),
        })
    }

    /// A snapshot of this queue's monitoring-only counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Repeatedly polls, delivering each value to `f`, until the queue is
    /// empty or `max_items` have been drained. Returns the count drained —
    /// `spec.md` §4.8.
    ///
    /// `f` runs synchronously on the caller's thread. By the time it is
    /// invoked for a given element, that element has already been removed
    /// from the queue: if `f` panics, `drain` does not roll back the
    /// element it was about to deliver.
    pub fn drain<F: FnMut(T)>(&self, max_items: usize, mut f: F) -> usize {
        let mut count = 0;
        while count < max_items {
            match self.poll() {
                Some(value) => {
                    f(value);
                    count += 1;
                }
                None => break,
            }
        }
        count
    }
}

impl<T> RingQueue<T> for SpscQueue<T> {
    fn offer(&self, value: T) -> bool {
        let t = self.tail.load(Ordering::Relaxed);
        let cell = self.ring.cell(t);
        let seq = cell.load_sequence(Ordering::Acquire);
        if seq != t {
            return false;
        }
        debug_assert_cell_sequence!(
            seq,
            t & (self.ring.capacity() as u64 - 1),
            self.ring.capacity()
        );

        // SAFETY: sequence == t means this cell is free for lap t/capacity;
        // only the sole producer ever writes here.
        unsafe { cell.write_value(value) };
        cell.store_sequence(t + 1, Ordering::Release);

        let new_tail = t + 1;
        debug_assert_monotonic!("tail", t, new_tail);
        self.tail.store(new_tail, Ordering::Relaxed);
        self.metrics.record_offer();
        true
    }

    fn poll(&self) -> Option<T> {
        let h = self.head.load(Ordering::Relaxed);
        let cell = self.ring.cell(h);
        let seq = cell.load_sequence(Ordering::Acquire);
        if seq != h + 1 {
            return None;
        }
        debug_assert_cell_sequence!(
            seq,
            h & (self.ring.capacity() as u64 - 1),
            self.ring.capacity()
        );

        // SAFETY: sequence == h+1 means this cell holds a published value
        // for lap h/capacity; only the sole consumer ever reads here.
        let value = unsafe { cell.read_value() };
        cell.store_sequence(h + self.ring.capacity() as u64, Ordering::Release);

        let new_head = h + 1;
        let tail = self.tail.load(Ordering::Relaxed);
        debug_assert_bounded_count!(tail.wrapping_sub(new_head), self.ring.capacity() as u64);
        debug_assert_head_not_past_tail!(new_head, tail);
        self.head.store(new_head, Ordering::Relaxed);
        self.metrics.record_polls(1);
        Some(value)
    }

    fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        let h = self.head.load(Ordering::Relaxed);
        let cell = self.ring.cell(h);
        if cell.load_sequence(Ordering::Acquire) != h + 1 {
            return None;
        }
        // SAFETY: sequence == h+1 means the value at this cell is
        // initialized and will remain so until this (sole) consumer
        // advances head itself.
        Some(unsafe { cell.clone_value() })
    }

    fn is_empty(&self) -> bool {
        let h = self.head.load(Ordering::Relaxed);
        self.ring.cell(h).load_sequence(Ordering::Acquire) != h + 1
    }

    fn len(&self) -> usize {
        let t = self.tail.load(Ordering::Relaxed);
        let h = self.head.load(Ordering::Relaxed);
        clamped_len(t, h, self.ring.capacity())
    }

    fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: no other thread can hold a reference to this queue while
        // it is being dropped, so [head, tail) is exactly the set of
        // published, unconsumed slots.
        unsafe { self.ring.drop_initialized_range(head, tail) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_single_pair() {
        let q = SpscQueue::<u64>::with_capacity(4).unwrap();
        assert!(q.offer(1));
        assert!(q.offer(2));
        assert!(q.offer(3));
        assert!(q.offer(4));
        assert!(!q.offer(5));
        assert_eq!(q.len(), 4);

        assert_eq!(q.poll(), Some(1));
        assert_eq!(q.poll(), Some(2));
        assert_eq!(q.poll(), Some(3));
        assert_eq!(q.poll(), Some(4));
        assert_eq!(q.poll(), None);
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
    }

    #[test]
    fn wraps_around_the_ring() {
        let q = SpscQueue::<u64>::with_capacity(4).unwrap();
        for round in 0..5u64 {
            for i in 0..4u64 {
                assert!(q.offer(round * 4 + i));
            }
            for i in 0..4u64 {
                assert_eq!(q.poll(), Some(round * 4 + i));
            }
        }
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let q = SpscQueue::<u64>::with_capacity(5).unwrap();
        assert_eq!(q.capacity(), 8);
    }

    #[test]
    fn capacity_of_one_is_smallest_power_of_two() {
        let q = SpscQueue::<u64>::with_capacity(1).unwrap();
        assert_eq!(q.capacity(), 1);
        assert!(q.offer(42));
        assert!(!q.offer(43));
        assert_eq!(q.poll(), Some(42));
        assert!(q.offer(44));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            SpscQueue::<u64>::with_capacity(0),
            Err(QueueError::InvalidCapacity { requested: 0 })
        );
    }

    #[test]
    fn peek_does_not_remove() {
        let q = SpscQueue::<u64>::with_capacity(4).unwrap();
        assert_eq!(q.peek(), None);
        q.offer(7);
        assert_eq!(q.peek(), Some(7));
        assert_eq!(q.peek(), Some(7));
        assert_eq!(q.poll(), Some(7));
        assert_eq!(q.peek(), None);
    }

    #[test]
    fn drain_stops_at_empty_and_at_max() {
        let q = SpscQueue::<u64>::with_capacity(8).unwrap();
        for i in 0..5u64 {
            q.offer(i);
        }
        let mut collected = Vec::new();
        let drained = q.drain(3, |v| collected.push(v));
        assert_eq!(drained, 3);
        assert_eq!(collected, vec![0, 1, 2]);

        let mut rest = Vec::new();
        let drained = q.drain(100, |v| rest.push(v));
        assert_eq!(drained, 2);
        assert_eq!(rest, vec![3, 4]);
    }

    #[test]
    fn drops_undrained_values() {
        use std::sync::atomic::AtomicUsize;
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Counted;
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let q = SpscQueue::<Counted>::with_capacity(4).unwrap();
            q.offer(Counted);
            q.offer(Counted);
            let _ = q.poll();
            // one consumed, one left in the ring for Drop to clean up
        }
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }
}
