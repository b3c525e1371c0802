//! Task sets and the partition entries queued into pipes.
//!
//! A task set pairs an index range `[0, set_size)` with a callback that
//! executes an arbitrary sub-range. The scheduler splits the range into
//! partitions, and the union of the sub-ranges handed to the callback is
//! exactly `[0, set_size)`, each index exactly once.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::counter::Counter;

type RangeFn = dyn Fn(Range<u32>, u32) + Send + Sync;

/// One submission unit: an index range plus the callback that processes it.
///
/// The callback may be invoked concurrently on several workers with disjoint
/// sub-ranges, so it must be reentrant. It receives the id of the worker it
/// runs on. It must not shut the scheduler down, and the scheduler is not
/// preemptive, so it should complete in bounded time.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpipe::{TaskScheduler, TaskSet};
///
/// let mut scheduler = TaskScheduler::new();
/// scheduler.initialize().unwrap();
///
/// let task = Arc::new(TaskSet::new(1024, |range, _worker_id| {
///     for index in range {
///         // process index
///         let _ = index;
///     }
/// }));
/// scheduler.submit(&task);
/// scheduler.wait_for(&task);
/// ```
pub struct TaskSet {
    set_size: u32,
    completion: Counter,
    exec: Box<RangeFn>,
}

impl TaskSet {
    /// Creates a task set over `[0, set_size)`.
    pub fn new<F>(set_size: u32, exec: F) -> Self
    where
        F: Fn(Range<u32>, u32) + Send + Sync + 'static,
    {
        TaskSet {
            set_size,
            completion: Counter::new(0),
            exec: Box::new(exec),
        }
    }

    /// Total index count of this set.
    pub fn set_size(&self) -> u32 {
        self.set_size
    }

    /// Whether every queued partition of the latest submission has executed.
    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// The completion counter tracking outstanding partitions.
    pub fn completion(&self) -> &Counter {
        &self.completion
    }

    pub(crate) fn execute_range(&self, range: Range<u32>, worker_id: u32) {
        (self.exec)(range, worker_id);
    }
}

impl fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSet")
            .field("set_size", &self.set_size)
            .field("outstanding", &self.completion.value())
            .finish_non_exhaustive()
    }
}

/// The value queued into a pipe slot: one partition of one task set.
pub(crate) struct Partition {
    pub(crate) task: Arc<TaskSet>,
    pub(crate) range: Range<u32>,
}

impl Partition {
    /// Runs the sub-range and retires it against the owning task set.
    pub(crate) fn execute(self, worker_id: u32) {
        #[cfg(feature = "trace")]
        let _span = crate::tracing::TraceGuard::new("partition", worker_id as usize);

        self.task.execute_range(self.range, worker_id);
        self.task.completion.decrement();
    }
}
