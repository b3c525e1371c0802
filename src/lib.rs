//! # taskpipe - Work-Stealing Task Scheduler
//!
//! A task scheduler for data-parallel workloads across a fixed pool of
//! worker threads. A caller submits a *task set* — an index range `[0, N)`
//! plus a callback that executes an arbitrary sub-range — and the scheduler
//! partitions the range, spreads the pieces across per-worker queues,
//! executes them in parallel and lets the caller wait for completion.
//!
//! ## Architecture
//!
//! - **Pipes**: one lock-free bounded deque per worker; the owner works the
//!   front (LIFO), thieves steal from the back (FIFO)
//! - **Partitioner**: splits a submission into `T·(T−1)` chunks so stealing
//!   can balance stragglers
//! - **Counters**: per-task-set completion tracking, raised before a
//!   partition becomes visible
//! - **Workers**: drain their own pipe, steal, spin, then sleep on a shared
//!   wake event
//!
//! Waiting threads cooperate instead of blocking: they execute queued work
//! until the awaited submission completes, so a single-threaded pool still
//! makes progress and nested submissions cannot deadlock.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskpipe::{TaskScheduler, TaskSet};
//!
//! let mut scheduler = TaskScheduler::new();
//! scheduler.initialize().unwrap();
//!
//! let task = Arc::new(TaskSet::new(1_000_000, |range, _worker_id| {
//!     for index in range {
//!         let _ = index; // process index
//!     }
//! }));
//! scheduler.submit(&task);
//! scheduler.wait_for(&task);
//! ```

pub mod counter;
mod event;
pub mod iter;
#[cfg(feature = "metrics")]
pub mod metrics;
mod partition;
mod pipe;
pub mod scheduler;
pub mod task;
pub mod topology;
#[cfg(feature = "trace")]
pub mod tracing;

pub use counter::Counter;
pub use iter::{ParallelSlice, ParallelSliceMut};
pub use scheduler::{Error, SchedulerConfig, TaskScheduler};
pub use task::TaskSet;

/// How worker threads are placed on cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinningStrategy {
    /// Let the OS schedule workers freely.
    None,
    /// Pin worker `i` to core `i` (wrapping over the detected core list).
    Linear,
}
