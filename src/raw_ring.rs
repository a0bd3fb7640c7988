use crate::cell::Cell;

/// Wrapper type that forces 128-byte alignment, which is enough to isolate
/// a field from its neighbors on every cache-line width actually in use on
/// modern CPUs (64 bytes) while also defeating adjacent-line prefetchers
/// that pull in pairs of lines — `spec.md` §4.9.
///
/// This mirrors the teacher crate's own `CacheAligned` rather than reaching
/// for `crossbeam-utils::CachePadded` (which targets a narrower, arch-
/// dependent width): the fixed 128-byte repr is what `spec.md` asks for.
#[repr(align(128))]
pub(crate) struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// The fixed-size cell array shared by every endpoint — `spec.md` §3 "Ring".
///
/// `RawRing` owns the buffer only; the cursors (`head`/`tail`) belong to the
/// endpoint that wraps it, since each endpoint advances them under a
/// different concurrency protocol (§4.3–4.6).
pub(crate) struct RawRing<T> {
    cells: Box<[Cell<T>]>,
    mask: usize,
}

impl<T> RawRing<T> {
    /// `capacity` must already be a power of two.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let cells: Box<[Cell<T>]> = (0..capacity as u64).map(Cell::new).collect();
        Self {
            cells,
            mask: capacity - 1,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub(crate) fn cell(&self, pos: u64) -> &Cell<T> {
        &self.cells[(pos as usize) & self.mask]
    }

    /// Drops every value still logically held in `[head, tail)`.
    ///
    /// # Safety
    /// Caller must guarantee every slot in `[head, tail)` was written by a
    /// producer and never consumed — i.e. this is only sound to call from
    /// the owning endpoint's `Drop` impl, where `head`/`tail` are the final
    /// observed cursor values and no other thread can be racing them.
    pub(crate) unsafe fn drop_initialized_range(&mut self, head: u64, tail: u64) {
        let mut pos = head;
        while pos != tail {
            let cell = &self.cells[(pos as usize) & self.mask];
            drop(cell.read_value());
            pos = pos.wrapping_add(1);
        }
    }
}
