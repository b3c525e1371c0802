//! Completion counters for task set tracking.
//!
//! Every task set carries a counter that is raised once per queued partition
//! and lowered once per executed partition. A submission is complete when its
//! counter reads zero after having been positive; waiters poll the counter
//! while cooperatively running work.

use std::sync::atomic::{AtomicU32, Ordering};

/// A thread-safe counter of outstanding partitions.
///
/// The submitter raises the counter *before* a partition becomes visible to
/// executors, so the counter is never observed negative.
#[derive(Debug, Default)]
pub struct Counter {
    inner: AtomicU32,
}

impl Counter {
    /// Creates a new counter with the specified initial value.
    pub fn new(initial: u32) -> Self {
        Counter {
            inner: AtomicU32::new(initial),
        }
    }

    /// Raises the counter by one.
    pub fn increment(&self) {
        self.inner.fetch_add(1, Ordering::SeqCst);
    }

    /// Lowers the counter by one.
    pub fn decrement(&self) {
        self.inner.fetch_sub(1, Ordering::SeqCst);
    }

    /// Returns the current value of the counter.
    pub fn value(&self) -> u32 {
        self.inner.load(Ordering::SeqCst)
    }

    /// Checks whether the counter has reached zero.
    pub fn is_complete(&self) -> bool {
        self.value() == 0
    }

    /// Resets the counter to the specified value.
    pub fn reset(&self, value: u32) {
        self.inner.store(value, Ordering::SeqCst);
    }
}
