use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

/// One slot of the ring: a sequence number plus the payload it guards.
///
/// This is the substrate every endpoint (`SpscQueue`, `MpscQueue`,
/// `SpmcQueue`, `MpmcQueue`) is built from — `spec.md` §4.1.
///
/// # Safety / memory-ordering contract
///
/// `value` is accessed through an `UnsafeCell` with no independent
/// synchronization: a producer's write to `value` happens-before its
/// `store_sequence` release, and a consumer's `load_sequence` acquire
/// happens-before its read of `value`. The release/acquire pair on
/// `sequence` is what makes the unsynchronized `value` access sound — see
/// `spec.md` §4.1. Callers must not read or write `value` without first
/// establishing that ordering via `sequence`.
pub(crate) struct Cell<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

// Safety: a `Cell<T>` is shared across threads only through the owning
// ring's head/tail protocol, which hands exclusive access to `value` to
// exactly one thread at a time (the producer between claim and release, the
// consumer between acquire and advance).
unsafe impl<T: Send> Send for Cell<T> {}
unsafe impl<T: Send> Sync for Cell<T> {}

impl<T> Cell<T> {
    /// Creates a cell initialized to lap 0 (`sequence == index`), matching
    /// the free-slot invariant in `spec.md` §3.
    pub(crate) fn new(index: u64) -> Self {
        Self {
            sequence: AtomicU64::new(index),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub(crate) fn load_sequence(&self, order: Ordering) -> u64 {
        self.sequence.load(order)
    }

    #[inline]
    pub(crate) fn store_sequence(&self, seq: u64, order: Ordering) {
        self.sequence.store(seq, order);
    }

    /// Writes the payload. Must only be called by the thread that has
    /// claimed this cell's current lap, before it releases the sequence.
    ///
    /// # Safety
    /// Caller must ensure no other thread is concurrently reading or
    /// writing `value` for this lap.
    #[inline]
    pub(crate) unsafe fn write_value(&self, value: T) {
        (*self.value.get()).write(value);
    }

    /// Reads the payload out, leaving the slot logically empty. Must only
    /// be called by the thread that has claimed this cell's current lap
    /// for consumption, after observing the publishing release.
    ///
    /// # Safety
    /// Caller must ensure the slot holds an initialized value for the
    /// current lap and that no other thread reads it concurrently.
    #[inline]
    pub(crate) unsafe fn read_value(&self) -> T {
        (*self.value.get()).assume_init_read()
    }

    /// Clones the payload without removing it. Used by `peek`, which must
    /// not mutate queue state (`spec.md` §4.7).
    ///
    /// # Safety
    /// Caller must ensure the slot holds an initialized value for the
    /// current lap for the duration of the clone. On the multi-consumer
    /// endpoints this is not guaranteed by the pre-call sequence check
    /// alone — another consumer can claim and release the slot, and a
    /// wrapping producer can start writing it, while this call is still in
    /// progress. Callers on those endpoints must re-check the sequence
    /// after the call returns and discard the result if it no longer
    /// matches.
    #[inline]
    pub(crate) unsafe fn clone_value(&self) -> T
    where
        T: Clone,
    {
        (*self.value.get()).assume_init_ref().clone()
    }
}
