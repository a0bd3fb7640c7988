//! Debug-only assertion macros for the structural invariants in `spec.md` §8.
//!
//! Each macro is a zero-cost no-op in release builds (`debug_assert!`
//! underneath). They exist to catch protocol bugs during development and in
//! the test suite, not to be part of the public API.

/// P2: `0 <= tail - head <= capacity`.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "P2 violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// P2 (consumer side): head may never advance past the observed tail.
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "P2 violated: advancing head to {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

/// Cursors (`head`, `tail`) are monotonically non-decreasing.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "cursor {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// P3: a cell's sequence observed in isolation between operations must sit
/// on one of the two values a lap predicts (`i + k*capacity` or `+1`).
macro_rules! debug_assert_cell_sequence {
    ($seq:expr, $index:expr, $capacity:expr) => {
        debug_assert!(
            {
                let delta = ($seq).wrapping_sub($index as u64) % ($capacity as u64);
                delta == 0 || delta == 1
            },
            "P3 violated: cell {} has sequence {} inconsistent with capacity {}",
            $index,
            $seq,
            $capacity
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_cell_sequence;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_monotonic;
