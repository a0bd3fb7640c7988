use std::sync::atomic::{AtomicUsize, Ordering};

/// Best-effort, monitoring-only counters for a single queue instance.
///
/// These are not part of the queue's correctness protocol — nothing reads
/// them to make a claim/publish decision. They exist for the same reason
/// `size()` does (`spec.md` §4.7, §9 "Approximate size under concurrency"):
/// an operator watching a dashboard, not a synchronization point. Counts are
/// relaxed `fetch_add`s, so concurrent snapshots may be stale by the time
/// they're read.
#[derive(Debug, Default)]
pub struct Metrics {
    offers_succeeded: AtomicUsize,
    polls_succeeded: AtomicUsize,
}

/// A point-in-time copy of a [`Metrics`] instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total successful `offer` calls observed so far.
    pub offers_succeeded: usize,
    /// Total successful `poll`/`drain` deliveries observed so far.
    pub polls_succeeded: usize,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_offer(&self) {
        self.offers_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_polls(&self, n: usize) {
        if n > 0 {
            self.polls_succeeded.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            offers_succeeded: self.offers_succeeded.load(Ordering::Relaxed),
            polls_succeeded: self.polls_succeeded.load(Ordering::Relaxed),
        }
    }
}
