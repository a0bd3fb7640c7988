use crate::backoff::Backoff;
use crate::invariants::{
    debug_assert_cell_sequence, debug_assert_head_not_past_tail, debug_assert_monotonic,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::raw_ring::{CachePadded, RawRing};
use crate::{clamped_len, rounded_capacity, QueueError, RingQueue};
use std::sync::atomic::{AtomicU64, Ordering};

/// Many-producer, single-consumer ring queue — `spec.md` §4.4.
///
/// `offer` is lock-free: producers race a single CAS on `tail` and retry on
/// contention. `poll` is wait-free, identical to [`crate::SpscQueue::poll`],
/// because `head` still has exactly one writer — the sole consumer.
///
/// FIFO is guaranteed per slot index, and the total enqueue order across
/// producers is the order in which they win the `tail` CAS (`spec.md` §5).
pub struct MpscQueue<T> {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    ring: RawRing<T>,
    metrics: Metrics,
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
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
    /// `spec.md` §4.8. Available here because there is exactly one
    /// consumer to amortize the `head` update for.
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

impl<T> RingQueue<T> for MpscQueue<T> {
    fn offer(&self, value: T) -> bool {
        let mut backoff = Backoff::new();
        let mut t = self.tail.load(Ordering::Relaxed);

        loop {
            let cell = self.ring.cell(t);
            let seq = cell.load_sequence(Ordering::Acquire);
            let diff = seq.wrapping_sub(t) as i64;

            if diff == 0 {
                match self
                    .tail
                    .compare_exchange_weak(t, t + 1, Ordering::AcqRel, Ordering::Relaxed)
                {
                    Ok(_) => {
                        debug_assert_monotonic!("tail", t, t + 1);
                        debug_assert_cell_sequence!(
                            seq,
                            t & (self.ring.capacity() as u64 - 1),
                            self.ring.capacity()
                        );
                        // SAFETY: this thread won the CAS claiming slot t;
                        // no other producer can write here until it laps
                        // back around.
                        unsafe { cell.write_value(value) };
                        cell.store_sequence(t + 1, Ordering::Release);
                        self.metrics.record_offer();
                        return true;
                    }
                    Err(actual) => {
                        t = actual;
                    }
                }
            } else if diff < 0 {
                return false; // full: this slot still holds an older lap
            } else {
                // another producer already advanced tail past t; re-read
                t = self.tail.load(Ordering::Relaxed);
                backoff.spin();
            }
        }
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

        // SAFETY: sequence == h+1 means this cell holds a published value;
        // only the sole consumer ever reads here.
        let value = unsafe { cell.read_value() };
        cell.store_sequence(h + self.ring.capacity() as u64, Ordering::Release);

        let new_head = h + 1;
        let tail = self.tail.load(Ordering::Relaxed);
        debug_assert_monotonic!("head", h, new_head);
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
        // SAFETY: only the sole consumer advances head, so this value
        // stays put until this thread's own next poll.
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

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: dropping requires unique ownership, so no producer/
        // consumer thread can still be racing these cursors.
        unsafe { self.ring.drop_initialized_range(head, tail) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_producer_fifo() {
        let q = MpscQueue::<u64>::with_capacity(16).unwrap();
        for i in 0..100_000u64 {
            assert!(q.offer(i));
        }
        for i in 0..100_000u64 {
            assert_eq!(q.poll(), Some(i));
        }
        assert_eq!(q.poll(), None);
    }

    #[test]
    fn full_queue_rejects_offer() {
        let q = MpscQueue::<u64>::with_capacity(2).unwrap();
        assert!(q.offer(1));
        assert!(q.offer(2));
        assert!(!q.offer(3));
        assert_eq!(q.poll(), Some(1));
        assert!(q.offer(3));
    }

    #[test]
    fn four_producers_one_consumer_conserves_count() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: u64 = 25_000;

        let q = Arc::new(MpscQueue::<u64>::with_capacity(1024).unwrap());
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        while !q.offer(i) {
                            std::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        let total = PRODUCERS as u64 * PER_PRODUCER;
        let mut consumed = 0u64;
        while consumed < total {
            if q.poll().is_some() {
                consumed += 1;
            }
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(consumed, total);
        assert!(q.is_empty());
    }
}
