use crate::backoff::Backoff;
use crate::invariants::{
    debug_assert_cell_sequence, debug_assert_head_not_past_tail, debug_assert_monotonic,
};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::raw_ring::{CachePadded, RawRing};
use crate::{clamped_len, rounded_capacity, QueueError, RingQueue};
use std::sync::atomic::{AtomicU64, Ordering};

/// Many-producer, many-consumer ring queue — `spec.md` §4.6.
///
/// The full two-sided protocol: `offer` uses the [`crate::MpscQueue`]
/// producer loop (CAS on `tail`), `poll` uses the [`crate::SpmcQueue`]
/// consumer loop (CAS on `head`), with one refinement — if a consumer
/// observes a cell sequence *greater* than `head + 1`, another consumer has
/// already taken that slot, so it spin-hints and retries instead of
/// reporting empty (`spec.md` §4.6).
///
/// Both `offer` and `poll` are lock-free. Neither is false-full nor
/// false-empty in steady state; either may retry under contention
/// (`spec.md` §4.6 "Emptiness/fullness under concurrency").
pub struct MpmcQueue<T> {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    ring: RawRing<T>,
    metrics: Metrics,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
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

impl<T> RingQueue<T> for MpmcQueue<T> {
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
        let mut backoff = Backoff::new();
        let mut h = self.head.load(Ordering::Relaxed);

        loop {
            let cell = self.ring.cell(h);
            let seq = cell.load_sequence(Ordering::Acquire);
            let diff = seq.wrapping_sub(h + 1) as i64;

            if diff == 0 {
                match self
                    .head
                    .compare_exchange_weak(h, h + 1, Ordering::AcqRel, Ordering::Relaxed)
                {
                    Ok(_) => {
                        debug_assert_monotonic!("head", h, h + 1);
                        debug_assert_cell_sequence!(
                            seq,
                            h & (self.ring.capacity() as u64 - 1),
                            self.ring.capacity()
                        );
                        debug_assert_head_not_past_tail!(
                            h + 1,
                            self.tail.load(Ordering::Relaxed)
                        );
                        // SAFETY: this thread won the CAS claiming slot h;
                        // no other consumer can read it until it laps back
                        // around.
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
            } else if diff < 0 {
                return None; // empty: nothing published for this slot yet
            } else {
                // another consumer already took h; re-read and retry
                h = self.head.load(Ordering::Relaxed);
                backoff.spin();
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

impl<T> Drop for MpmcQueue<T> {
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
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn basic_offer_poll() {
        let q = MpmcQueue::<u64>::with_capacity(4).unwrap();
        assert!(q.offer(1));
        assert!(q.offer(2));
        assert_eq!(q.poll(), Some(1));
        assert_eq!(q.poll(), Some(2));
        assert_eq!(q.poll(), None);
    }

    #[test]
    fn peek_does_not_remove_and_reports_empty_correctly() {
        let q = MpmcQueue::<u64>::with_capacity(4).unwrap();
        assert_eq!(q.peek(), None);
        q.offer(7);
        assert_eq!(q.peek(), Some(7));
        assert_eq!(q.peek(), Some(7));
        assert_eq!(q.poll(), Some(7));
        assert_eq!(q.peek(), None);
    }

    #[test]
    fn four_producers_four_consumers_conserve_every_value() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 25_000;
        const TOTAL: u64 = PRODUCERS * PER_PRODUCER;

        let q = Arc::new(MpmcQueue::<u64>::with_capacity(1024).unwrap());
        let results = Arc::new(Mutex::new(Vec::with_capacity(TOTAL as usize)));
        let consumed = Arc::new(AtomicUsize::new(0));
        let producers_done = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                let producers_done = Arc::clone(&producers_done);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let value = p * PER_PRODUCER + i;
                        while !q.offer(value) {
                            std::hint::spin_loop();
                        }
                    }
                    producers_done.fetch_add(1, Ordering::Release);
                })
            })
            .collect();

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                let results = Arc::clone(&results);
                let consumed = Arc::clone(&consumed);
                let producers_done = Arc::clone(&producers_done);
                thread::spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        match q.poll() {
                            Some(v) => {
                                local.push(v);
                                consumed.fetch_add(1, Ordering::Relaxed);
                            }
                            None => {
                                let all_produced =
                                    producers_done.load(Ordering::Acquire) as u64 == PRODUCERS;
                                if all_produced && consumed.load(Ordering::Relaxed) as u64 == TOTAL
                                {
                                    break;
                                }
                                std::hint::spin_loop();
                            }
                        }
                    }
                    results.lock().unwrap().extend(local);
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            c.join().unwrap();
        }

        let mut values = results.lock().unwrap().clone();
        values.sort_unstable();
        let unique: HashSet<_> = values.iter().copied().collect();
        assert_eq!(unique.len(), values.len(), "duplicate delivery detected");
        assert_eq!(values, (0..TOTAL).collect::<Vec<_>>());
    }
}
