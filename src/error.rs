use thiserror::Error;

/// Errors reported synchronously by queue construction.
///
/// All four endpoints (`SpscQueue`, `MpscQueue`, `SpmcQueue`, `MpmcQueue`)
/// share this error type since they share the same `with_capacity`
/// contract. There is no error variant for `offer`/`poll`/`peek`: fullness
/// and emptiness are not errors (they are reported via `bool`/`Option`, per
/// `spec.md` §7), and a "null element" or "null callback" has no
/// representation in Rust's type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The requested capacity was zero.
    #[error("invalid capacity: requested {requested}, must be at least 1")]
    InvalidCapacity {
        /// The capacity that was requested.
        requested: usize,
    },
}
