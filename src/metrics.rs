use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Scheduler counters, updated from the submit and worker paths.
#[derive(Debug)]
pub struct Metrics {
    /// Task sets handed to `submit`.
    pub task_sets_submitted: AtomicU64,
    /// Partitions pushed onto a pipe.
    pub partitions_queued: AtomicU64,
    /// Partitions executed, queued or inline.
    pub partitions_executed: AtomicU64,
    /// Partitions taken from another worker's pipe.
    pub steals: AtomicU64,
    /// Partitions run on the submitting thread because its pipe was full.
    pub inline_executions: AtomicU64,
    /// Times a worker exhausted its spin budget and slept.
    pub worker_sleeps: AtomicU64,
    /// When collection started.
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            task_sets_submitted: AtomicU64::new(0),
            partitions_queued: AtomicU64::new(0),
            partitions_executed: AtomicU64::new(0),
            steals: AtomicU64::new(0),
            inline_executions: AtomicU64::new(0),
            worker_sleeps: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Returns a snapshot of current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            task_sets_submitted: self.task_sets_submitted.load(Ordering::Relaxed),
            partitions_queued: self.partitions_queued.load(Ordering::Relaxed),
            partitions_executed: self.partitions_executed.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            inline_executions: self.inline_executions.load(Ordering::Relaxed),
            worker_sleeps: self.worker_sleeps.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub task_sets_submitted: u64,
    pub partitions_queued: u64,
    pub partitions_executed: u64,
    pub steals: u64,
    pub inline_executions: u64,
    pub worker_sleeps: u64,
    pub elapsed_seconds: f64,
}

impl MetricsSnapshot {
    /// Partitions executed per second since collection started.
    pub fn partitions_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.partitions_executed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Partitions queued but not yet executed from a queue.
    pub fn queued_backlog(&self) -> i64 {
        self.partitions_queued as i64
            - (self.partitions_executed as i64 - self.inline_executions as i64)
    }
}
