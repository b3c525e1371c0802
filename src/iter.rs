//! Parallel iteration over slices, built on task sets.

use std::ops::Range;
use std::sync::Arc;

use crate::scheduler::TaskScheduler;
use crate::task::TaskSet;

pub trait ParallelSlice<T> {
    fn task_iter<'a>(&'a self, scheduler: &'a TaskScheduler) -> ParallelIter<'a, T>;
}

pub trait ParallelSliceMut<T> {
    fn task_iter_mut<'a>(&'a mut self, scheduler: &'a TaskScheduler) -> ParallelIterMut<'a, T>;
}

impl<T: Sync> ParallelSlice<T> for [T] {
    fn task_iter<'a>(&'a self, scheduler: &'a TaskScheduler) -> ParallelIter<'a, T> {
        ParallelIter {
            slice: self,
            scheduler,
        }
    }
}

impl<T: Send> ParallelSliceMut<T> for [T] {
    fn task_iter_mut<'a>(&'a mut self, scheduler: &'a TaskScheduler) -> ParallelIterMut<'a, T> {
        ParallelIterMut {
            slice: self,
            scheduler,
        }
    }
}

pub struct ParallelIter<'a, T> {
    slice: &'a [T],
    scheduler: &'a TaskScheduler,
}

pub struct ParallelIterMut<'a, T> {
    slice: &'a mut [T],
    scheduler: &'a TaskScheduler,
}

/// Something that can process one `[start, end)` sub-range of the iteration
/// space. Partitions of the same submission run concurrently on several
/// workers, so implementations are applied through `&self` with disjoint
/// ranges.
trait RangeBody: Sync {
    fn apply(&self, range: Range<u32>);
}

/// Lifetime-erased pointer to a [`RangeBody`] on the caller's stack.
///
/// A task set callback must be `'static`, but `for_each` borrows the slice
/// and the operation. The handle erases the concrete body behind a data
/// pointer plus a monomorphised shim with the same `Range<u32>` shape the
/// partition callback receives, and `run_over` keeps the body alive by
/// waiting for the submission before returning.
#[derive(Clone, Copy)]
struct BodyHandle {
    data: *const (),
    apply: unsafe fn(*const (), Range<u32>),
}

// Safety: the handle is only dereferenced via `run` while the `Sync` body it
// points to is pinned on the `run_over` frame that is still waiting.
unsafe impl Send for BodyHandle {}
unsafe impl Sync for BodyHandle {}

impl BodyHandle {
    fn new<B: RangeBody>(body: &B) -> Self {
        unsafe fn shim<B: RangeBody>(data: *const (), range: Range<u32>) {
            unsafe { (*(data as *const B)).apply(range) }
        }
        BodyHandle {
            data: body as *const B as *const (),
            apply: shim::<B>,
        }
    }

    fn run(&self, range: Range<u32>) {
        unsafe { (self.apply)(self.data, range) }
    }
}

/// Submits a task set over `[0, len)` whose partitions call `body`, and
/// waits for it to complete before the borrowed body can go away.
fn run_over<B: RangeBody>(scheduler: &TaskScheduler, len: u32, body: &B) {
    let handle = BodyHandle::new(body);
    let task = Arc::new(TaskSet::new(len, move |range, _worker_id| {
        handle.run(range);
    }));
    scheduler.submit(&task);
    scheduler.wait_for(&task);
}

struct SharedSliceBody<'a, T, F> {
    slice: &'a [T],
    op: F,
}

impl<T: Sync, F: Fn(&T) + Sync> RangeBody for SharedSliceBody<'_, T, F> {
    fn apply(&self, range: Range<u32>) {
        for item in &self.slice[range.start as usize..range.end as usize] {
            (self.op)(item);
        }
    }
}

/// Mutable counterpart. The slice travels as a base pointer so that each
/// call can reconstruct just its own sub-slice.
struct MutSliceBody<T, F> {
    base: *mut T,
    len: usize,
    op: F,
}

// Safety: partitions of one submission are disjoint, so concurrent `apply`
// calls touch non-overlapping elements.
unsafe impl<T: Send, F: Sync> Sync for MutSliceBody<T, F> {}

impl<T: Send, F: Fn(&mut T) + Sync> RangeBody for MutSliceBody<T, F> {
    fn apply(&self, range: Range<u32>) {
        let start = range.start as usize;
        let end = range.end as usize;
        debug_assert!(end <= self.len);
        let sub = unsafe { std::slice::from_raw_parts_mut(self.base.add(start), end - start) };
        for item in sub {
            (self.op)(item);
        }
    }
}

impl<'a, T: Sync> ParallelIter<'a, T> {
    pub fn for_each<F>(self, op: F)
    where
        F: Fn(&T) + Sync + Send,
    {
        let len = u32::try_from(self.slice.len()).expect("slice too large for a task set");
        let body = SharedSliceBody {
            slice: self.slice,
            op,
        };
        run_over(self.scheduler, len, &body);
    }
}

impl<'a, T: Send> ParallelIterMut<'a, T> {
    pub fn for_each<F>(self, op: F)
    where
        F: Fn(&mut T) + Sync + Send,
    {
        let len = u32::try_from(self.slice.len()).expect("slice too large for a task set");
        let body = MutSliceBody {
            base: self.slice.as_mut_ptr(),
            len: self.slice.len(),
            op,
        };
        run_over(self.scheduler, len, &body);
    }
}
