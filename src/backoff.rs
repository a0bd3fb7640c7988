use std::hint;
use std::thread;

/// Adaptive backoff strategy (Crossbeam-style): spin with `PAUSE` hints,
/// then yield to the OS scheduler, then give up.
///
/// Used internally by the CAS retry loops in [`crate::MpscQueue`],
/// [`crate::SpmcQueue`] and [`crate::MpmcQueue`] wherever `spec.md` calls for
/// "spin-hint and retry". The queue itself never blocks: `is_completed`
/// exists so a contended caller can decide to stop retrying rather than
/// spin forever, but reaching it does not change the queue's semantics —
/// it is purely a hint for the caller's own retry policy.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10;

    /// Creates a fresh backoff instance.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Light spin with `PAUSE` hints.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1u32 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Heavier backoff: spin while cheap, then yield the thread.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else {
            thread::yield_now();
            if self.step <= Self::YIELD_LIMIT {
                self.step += 1;
            }
        }
    }

    /// Whether this backoff has exhausted its escalation steps.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Resets the backoff for the next contended wait.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progresses_and_completes() {
        let mut b = Backoff::new();
        assert_eq!(b.step, 0);

        b.spin();
        assert!(b.step > 0);

        while !b.is_completed() {
            b.snooze();
        }
        assert!(b.step > Backoff::YIELD_LIMIT);

        b.reset();
        assert_eq!(b.step, 0);
    }
}
