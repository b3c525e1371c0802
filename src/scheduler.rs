//! The work-stealing task scheduler.
//!
//! The scheduler owns one pipe per worker thread. A submission is split into
//! partitions and pushed onto the pipe owned by the *submitting* thread;
//! workers drain their own pipe from the front and steal from everyone
//! else's back. Waiting threads do not block: they run work themselves until
//! the awaited task set completes, which also keeps a single-threaded
//! configuration live without any worker threads at all.

use std::cell::Cell;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::event::SignalEvent;
#[cfg(feature = "metrics")]
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::partition::{partition_count, Partitioner};
use crate::pipe::Pipe;
use crate::task::{Partition, TaskSet};
use crate::topology;
use crate::PinningStrategy;

/// Consecutive failed drain attempts before a worker sleeps on the event.
const SPIN_COUNT: u32 = 100;

thread_local! {
    // Which pipe the current thread owns. The initialising thread and all
    // threads that never joined a scheduler read as 0, matching the pipe of
    // the initialising thread.
    static WORKER_ID: Cell<u32> = Cell::new(0);
}

type TaskPipe = Pipe<Partition>;

/// Errors surfaced by scheduler lifecycle operations.
///
/// Everything on the hot path is absorbed instead: a full pipe falls back to
/// inline execution and a failed steal moves on to the next pipe.
#[derive(Debug)]
pub enum Error {
    /// A worker thread could not be spawned.
    Spawn(io::Error),
    /// Worker threads unwound from a panicking task callback.
    WorkerPanicked { count: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "worker spawn failure: {e}"),
            Self::WorkerPanicked { count } => {
                write!(f, "{count} worker thread(s) panicked")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::WorkerPanicked { .. } => None,
        }
    }
}

/// Pool construction options.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker count including the initialising thread. Clamped to at least 1.
    pub num_threads: u32,
    /// Optional worker-to-core pinning.
    pub pinning: PinningStrategy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            num_threads: topology::hardware_thread_count(),
            pinning: PinningStrategy::None,
        }
    }
}

/// State shared between the scheduler handle and its worker threads.
struct Shared {
    pipes: Box<[TaskPipe]>,
    running: AtomicBool,
    threads_running: AtomicUsize,
    new_task_event: SignalEvent,
    num_threads: u32,
    num_partitions: u32,
    #[cfg(feature = "metrics")]
    metrics: Metrics,
}

/// The scheduler. One instance per process is the expected shape.
///
/// `initialize` spawns `T − 1` workers; the initialising thread is worker 0
/// and participates in execution whenever it waits. Dropping the scheduler
/// stops the workers and waits for them to exit.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpipe::{TaskScheduler, TaskSet};
///
/// let mut scheduler = TaskScheduler::new();
/// scheduler.initialize_with_threads(4).unwrap();
///
/// let task = Arc::new(TaskSet::new(1000, |range, worker_id| {
///     println!("worker {worker_id} got {range:?}");
/// }));
/// scheduler.submit(&task);
/// scheduler.wait_for(&task);
/// ```
pub struct TaskScheduler {
    shared: Option<Arc<Shared>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskScheduler {
    /// Creates an uninitialised scheduler. No threads exist until
    /// [`initialize`](Self::initialize) is called.
    pub fn new() -> Self {
        TaskScheduler {
            shared: None,
            workers: Vec::new(),
        }
    }

    /// Initialises with one worker per hardware thread.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.initialize_with_config(SchedulerConfig::default())
    }

    /// Initialises with an explicit thread count.
    pub fn initialize_with_threads(&mut self, num_threads: u32) -> Result<(), Error> {
        self.initialize_with_config(SchedulerConfig {
            num_threads,
            pinning: PinningStrategy::None,
        })
    }

    /// Initialises the pool. Re-initialising first stops the existing
    /// workers (waiting for them) and replaces the pipes; partitions still
    /// queued at that point are discarded unexecuted.
    pub fn initialize_with_config(&mut self, config: SchedulerConfig) -> Result<(), Error> {
        self.stop_threads(true);

        let num_threads = config.num_threads.max(1);
        let pipes: Box<[TaskPipe]> = (0..num_threads).map(|_| TaskPipe::new()).collect();
        let shared = Arc::new(Shared {
            pipes,
            running: AtomicBool::new(true),
            threads_running: AtomicUsize::new(0),
            new_task_event: SignalEvent::new(),
            num_threads,
            num_partitions: partition_count(num_threads),
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        });

        // The initialising thread owns pipe 0.
        WORKER_ID.with(|id| id.set(0));
        self.shared = Some(Arc::clone(&shared));

        let core_ids = match config.pinning {
            PinningStrategy::None => Vec::new(),
            PinningStrategy::Linear => core_affinity::get_core_ids().unwrap_or_default(),
        };

        for worker_id in 1..num_threads {
            let worker_shared = Arc::clone(&shared);
            let core_id = if core_ids.is_empty() {
                None
            } else {
                core_ids.get(worker_id as usize % core_ids.len()).copied()
            };

            shared.threads_running.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("taskpipe-worker-{worker_id}"))
                .spawn(move || {
                    if let Some(core_id) = core_id {
                        core_affinity::set_for_current(core_id);
                    }
                    worker_loop(&worker_shared, worker_id);
                });

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    shared.threads_running.fetch_sub(1, Ordering::SeqCst);
                    self.stop_threads(true);
                    return Err(Error::Spawn(err));
                }
            }
        }

        Ok(())
    }

    /// Splits the task set into partitions and queues them on the calling
    /// thread's pipe.
    ///
    /// The set's completion counter is raised before each partition becomes
    /// stealable, so it can never be observed negative. When the pipe fills
    /// up the remaining partitions run inline on the calling thread instead
    /// of blocking. Workers are woken once everything is placed.
    ///
    /// May be called from the initialising thread or from inside a task
    /// callback (nested submission). Panics if the scheduler has not been
    /// initialised.
    pub fn submit(&self, task: &Arc<TaskSet>) {
        let shared = self.expect_shared();
        let worker_id = WORKER_ID.with(|id| id.get());

        task.completion().reset(0);
        #[cfg(feature = "metrics")]
        shared.metrics.task_sets_submitted.fetch_add(1, Ordering::Relaxed);

        for range in Partitioner::new(task.set_size(), shared.num_partitions) {
            // Raised before the push so an executor that races us cannot
            // drive the counter below zero.
            task.completion().increment();
            let entry = Partition {
                task: Arc::clone(task),
                range,
            };
            match shared.pipes[worker_id as usize].try_push_front(entry) {
                Ok(()) => {
                    #[cfg(feature = "metrics")]
                    shared.metrics.partitions_queued.fetch_add(1, Ordering::Relaxed);
                }
                Err(entry) => {
                    // Pipe full: run it here rather than block or drop it.
                    shared.new_task_event.signal();
                    #[cfg(feature = "metrics")]
                    {
                        // Inline runs count as executed too; both are bumped
                        // before the callback so a waiter that observes the
                        // completion cannot read a stale snapshot.
                        shared.metrics.inline_executions.fetch_add(1, Ordering::Relaxed);
                        shared
                            .metrics
                            .partitions_executed
                            .fetch_add(1, Ordering::Relaxed);
                    }
                    entry.execute(worker_id);
                }
            }
        }
        shared.new_task_event.signal();
    }

    /// Cooperatively waits until the task set's latest submission completes.
    ///
    /// The calling thread executes queued work while it waits, so completion
    /// is reached even when every worker is busy elsewhere or when the pool
    /// has a single thread.
    pub fn wait_for(&self, task: &TaskSet) {
        let shared = self.expect_shared();
        let worker_id = WORKER_ID.with(|id| id.get());
        while !task.is_complete() {
            try_run_task(shared, worker_id);
        }
    }

    /// Runs at most one queued partition on the calling thread. Returns
    /// whether anything was executed. This is the yield-like building block
    /// of the wait operations.
    pub fn run_one(&self) -> bool {
        let shared = self.expect_shared();
        try_run_task(shared, WORKER_ID.with(|id| id.get()))
    }

    /// Drains until the calling thread finds no work and every other pipe
    /// surveys empty.
    ///
    /// The survey is not a global snapshot: a task set submitted concurrently
    /// from another thread can be missed. This is a best-effort quiescence
    /// barrier, not a fence.
    pub fn wait_for_all(&self) {
        let shared = self.expect_shared();
        let worker_id = WORKER_ID.with(|id| id.get());
        loop {
            let ran = try_run_task(shared, worker_id);
            let others_empty = (0..shared.num_threads)
                .filter(|&other| other != worker_id)
                .all(|other| shared.pipes[other as usize].is_empty());
            if others_empty && !ran {
                break;
            }
        }
    }

    /// Drains all pipes, then stops and joins the workers and releases the
    /// pipes. Reports workers that unwound from panicking callbacks.
    pub fn wait_for_all_and_shutdown(&mut self) -> Result<(), Error> {
        if self.shared.is_some() {
            self.wait_for_all();
            let panicked = self.stop_threads(true);
            if panicked > 0 {
                return Err(Error::WorkerPanicked { count: panicked });
            }
        }
        Ok(())
    }

    /// Thread count of the current pool, or 0 before initialisation.
    pub fn num_task_threads(&self) -> u32 {
        self.shared.as_ref().map_or(0, |shared| shared.num_threads)
    }

    /// A snapshot of the scheduler's internal counters.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.shared.as_ref().map(|shared| shared.metrics.snapshot())
    }

    fn expect_shared(&self) -> &Shared {
        self.shared
            .as_ref()
            .expect("scheduler not initialized: call initialize() first")
    }

    /// Clears the run flag and, when `wait` is set, keeps signalling the
    /// event until every worker has observed it and exited. Returns how many
    /// workers terminated by panic. Queued partitions are dropped with the
    /// pipes once the last reference goes away.
    fn stop_threads(&mut self, wait: bool) -> usize {
        let Some(shared) = self.shared.take() else {
            return 0;
        };

        shared.running.store(false, Ordering::SeqCst);
        while wait && shared.threads_running.load(Ordering::SeqCst) > 0 {
            // Keep firing so sleepers re-check the run flag; yield so this
            // loop does not monopolise a core while they wake.
            shared.new_task_event.signal();
            thread::yield_now();
        }

        let mut panicked = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        panicked
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        TaskScheduler::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        let panicked = self.stop_threads(true);
        if panicked > 0 {
            eprintln!("taskpipe: {panicked} worker thread(s) panicked");
        }
    }
}

/// Lowers `threads_running` when the worker exits, including by unwinding
/// out of a panicking task callback, so `stop_threads(wait)` cannot hang.
struct RunningGuard<'a> {
    shared: &'a Shared,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.shared.threads_running.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(shared: &Shared, worker_id: u32) {
    WORKER_ID.with(|id| id.set(worker_id));
    let _exit = RunningGuard { shared };

    let mut spin_count = 0u32;
    while shared.running.load(Ordering::Relaxed) {
        if !try_run_task(shared, worker_id) {
            spin_count += 1;
            if spin_count > SPIN_COUNT {
                #[cfg(feature = "metrics")]
                shared.metrics.worker_sleeps.fetch_add(1, Ordering::Relaxed);
                shared.new_task_event.wait();
                spin_count = 0;
            }
        }
    }

    #[cfg(feature = "trace")]
    crate::tracing::collect_local_trace();
}

/// Drains the caller's own pipe first, then tries to steal from the others
/// in round-robin order. Executes at most one partition.
fn try_run_task(shared: &Shared, worker_id: u32) -> bool {
    let mut entry = shared.pipes[worker_id as usize].try_pop_front();

    if entry.is_none() {
        let num_threads = shared.num_threads;
        let mut other = (worker_id + 1) % num_threads;
        while entry.is_none() && other != worker_id {
            entry = shared.pipes[other as usize].try_steal_back();
            #[cfg(feature = "metrics")]
            if entry.is_some() {
                shared.metrics.steals.fetch_add(1, Ordering::Relaxed);
            }
            other = (other + 1) % num_threads;
        }
    }

    match entry {
        Some(partition) => {
            // Bumped before the callback so the count is already visible
            // when the partition's completion decrement lands.
            #[cfg(feature = "metrics")]
            shared
                .metrics
                .partitions_executed
                .fetch_add(1, Ordering::Relaxed);
            partition.execute(worker_id);
            true
        }
        None => false,
    }
}
