use crate::backoff::Backoff;
use crate::invariants::{
    debug_assert_cell_sequence, debug_assert_head_not_past_tail, debug_assert_monotonic,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::raw_ring::{CachePadded, RawRing};
use crate::{clamped_len, rounded_capacity, QueueError, RingQueue};
use std::sync::atomic::{AtomicU64, Ordering};

/// Single-producer, many-consumer ring queue — `spec.md` §4.5.
///
/// `offer` is wait-free, identical to [`crate::SpscQueue::offer`], because
/// `tail` still has exactly one writer — the sole producer. `poll` is
/// lock-free: consumers race a single CAS on `head` and retry on
/// contention.
///
/// No `drain` method: batching a `head` update only pays off with a single
/// consumer to amortize it for (`spec.md` §4.8).
pub struct SpmcQueue<T> {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    ring: RawRing<T>,
    metrics: Metrics,
}

unsafe impl<T: Send> Send for SpmcQueue<T> {}
unsafe impl<T: Send> Sync for SpmcQueue<T> {}

impl<T> SpmcQueue<T> {
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
}

impl<T> RingQueue<T> for SpmcQueue<T> {
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
        let mut backoff = Backoff::new();
        let mut h = self.head.load(Ordering::Relaxed);

        loop {
            let cell = self.ring.cell(h);
            let seq = cell.load_sequence(Ordering::Acquire);
            if seq != h + 1 {
                return None; // empty
            }
            debug_assert_cell_sequence!(
                seq,
                h & (self.ring.capacity() as u64 - 1),
                self.ring.capacity()
            );

            match self
                .head
                .compare_exchange_weak(h, h + 1, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    debug_assert_monotonic!("head", h, h + 1);
                    debug_assert_head_not_past_tail!(
                        h + 1,
                        self.tail.load(Ordering::Relaxed)
                    );
                    // SAFETY: this thread won the CAS claiming slot h; no
                    // other consumer can read it until it laps back around.
                    let value = unsafe { cell.read_value() };
                    cell.store_sequence(h + self.ring.capacity() as u64, Ordering::Release);
                    self.metrics.record_polls(1);
                    return Some(value);
                }
                Err(actual) => {
                    h = actual;
                    backoff.spin();
                }
            }
        }
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
        // SAFETY: the slot was published for lap h at the first load above,
        // but another consumer can CAS `head` past h, read the value, and
        // release the slot for a wrapping producer's write while we're
        // still inside clone_value() — that's a real data race on the
        // UnsafeCell, not just a stale read. Re-checking the sequence after
        // the clone catches every such interleaving: if it still reads
        // h + 1, no consumer and no producer touched this slot while we
        // were cloning it, so the clone we took was sound.
        let value = unsafe { cell.clone_value() };
        if cell.load_sequence(Ordering::Acquire) != h + 1 {
            return None;
        }
        Some(value)
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

impl<T> Drop for SpmcQueue<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: dropping requires unique ownership, so no producer/
        // consumer thread can still be racing these cursors.
        unsafe { self.ring.drop_initialized_range(head, tail) };
    }
}
