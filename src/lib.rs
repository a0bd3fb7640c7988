//! Bounded, array-backed, lock-free ring-buffer queues.
//!
//! Four endpoints share one algorithmic substrate — a per-cell sequence
//! number protocol (a variant of Vyukov's bounded queue) over a
//! power-of-two-sized array:
//!
//! - [`SpscQueue`] — one producer, one consumer. Both sides wait-free.
//! - [`MpscQueue`] — many producers, one consumer. `offer` lock-free (CAS
//!   retry on contention), `poll` wait-free.
//! - [`SpmcQueue`] — one producer, many consumers. `offer` wait-free,
//!   `poll` lock-free.
//! - [`MpmcQueue`] — many producers, many consumers. Both sides lock-free.
//!
//! None of the four ever blocks: a full `offer` returns `false`, an empty
//! `poll` returns `None`, immediately, every time. There is no unbounded
//! growth, no blocking/parking, and no iteration over contents — callers
//! that need retry/backoff/timeout semantics build them on top of the
//! `bool`/`Option` return values, for instance with the [`Backoff`] helper
//! this crate already uses internally.
//!
//! # Example
//!
//! ```
//! use ringq::{MpscQueue, RingQueue};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(MpscQueue::<u64>::with_capacity(16).unwrap());
//!
//! let producer = Arc::clone(&queue);
//! let handle = thread::spawn(move || {
//!     for i in 0..1000 {
//!         while !producer.offer(i) {
//!             std::hint::spin_loop();
//!         }
//!     }
//! });
//!
//! let mut received = 0;
//! while received < 1000 {
//!     received += queue.drain(1000, |_| {});
//! }
//! handle.join().unwrap();
//! ```

mod backoff;
mod cell;
mod error;
mod invariants;
mod metrics;
mod mpmc;
mod mpsc;
mod raw_ring;
mod spmc;
mod spsc;

pub use backoff::Backoff;
pub use error::QueueError;
pub use metrics::MetricsSnapshot;
pub use mpmc::MpmcQueue;
pub use mpsc::MpscQueue;
pub use spmc::SpmcQueue;
pub use spsc::SpscQueue;

/// The operation set every endpoint in this crate exposes — `spec.md` §6.
///
/// `drain` is deliberately not part of this trait: it is only meaningful
/// for the single-consumer endpoints ([`SpscQueue`], [`MpscQueue`]), which
/// expose it as an inherent method instead (`spec.md` §4.8).
pub trait RingQueue<T> {
    /// Attempts to enqueue `value`. Returns `true` on success, `false` if
    /// the queue is full. Never blocks.
    fn offer(&self, value: T) -> bool;

    /// Attempts to dequeue the next value. Returns `None` if the queue is
    /// empty. Never blocks.
    fn poll(&self) -> Option<T>;

    /// Returns a clone of the next value to be dequeued, without removing
    /// it, or `None` if the queue is empty.
    ///
    /// This is best-effort and not a synchronization point (`spec.md` §4.7,
    /// §9): under concurrent `poll`s the value `peek` returns may already
    /// be gone by the time the caller inspects it.
    fn peek(&self) -> Option<T>
    where
        T: Clone;

    /// `true` iff no element is currently available at the head of the
    /// queue. Approximate under concurrency.
    fn is_empty(&self) -> bool;

    /// Approximate current element count, clamped to `[0, capacity()]`.
    /// Intended for monitoring only — `spec.md` §4.7, §9.
    fn len(&self) -> usize;

    /// The queue's fixed, post-rounding capacity (a power of two).
    fn capacity(&self) -> usize;
}

/// Rounds a requested capacity up to the next power of two, or rejects it.
///
/// Shared by all four endpoints' `with_capacity` constructors —
/// `spec.md` §4.2, §6, P1.
pub(crate) fn rounded_capacity(requested: usize) -> Result<usize, QueueError> {
    if requested == 0 {
        return Err(QueueError::InvalidCapacity { requested });
    }
    Ok(requested.next_power_of_two())
}

#[inline]
pub(crate) fn clamped_len(tail: u64, head: u64, capacity: usize) -> usize {
    let diff = tail.wrapping_sub(head) as i64;
    diff.clamp(0, capacity as i64) as usize
}
