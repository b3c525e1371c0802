use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use taskpipe::{TaskScheduler, TaskSet};

#[test]
fn test_every_index_executes_exactly_once() {
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(4).unwrap();

    const N: u32 = 100_000;
    let seen = Arc::new(Mutex::new(vec![0u8; N as usize]));
    let seen_clone = Arc::clone(&seen);
    let task = Arc::new(TaskSet::new(N, move |range, _| {
        let mut seen = seen_clone.lock().unwrap();
        for index in range {
            seen[index as usize] += 1;
        }
    }));

    scheduler.submit(&task);
    scheduler.wait_for(&task);

    let seen = seen.lock().unwrap();
    assert!(
        seen.iter().all(|&count| count == 1),
        "each index must be executed exactly once"
    );
}

#[test]
fn test_worker_ids_stay_in_range() {
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(3).unwrap();

    let ids = Arc::new(Mutex::new(HashSet::new()));
    let ids_clone = Arc::clone(&ids);
    let task = Arc::new(TaskSet::new(50_000, move |_, worker_id| {
        ids_clone.lock().unwrap().insert(worker_id);
    }));

    scheduler.submit(&task);
    scheduler.wait_for(&task);

    assert!(ids.lock().unwrap().iter().all(|&id| id < 3));
}

#[test]
fn test_sum_of_executed_lengths_equals_set_size() {
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(4).unwrap();

    for n in [1u32, 7, 12, 100, 999, 65_536] {
        let total = Arc::new(AtomicU64::new(0));
        let total_clone = Arc::clone(&total);
        let task = Arc::new(TaskSet::new(n, move |range, _| {
            total_clone.fetch_add((range.end - range.start) as u64, Ordering::SeqCst);
        }));

        scheduler.submit(&task);
        scheduler.wait_for(&task);
        assert_eq!(total.load(Ordering::SeqCst), n as u64);
    }
}

#[test]
fn test_completion_counter_never_negative() {
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(4).unwrap();

    let task_probe: Arc<Mutex<Option<Arc<TaskSet>>>> = Arc::new(Mutex::new(None));
    let probe_clone = Arc::clone(&task_probe);
    let task = Arc::new(TaskSet::new(10_000, move |_, _| {
        // Sample the counter from inside a callback, mid-submission.
        if let Some(task) = probe_clone.lock().unwrap().as_ref() {
            let value = task.completion().value();
            assert!(value < u32::MAX / 2, "counter underflowed to {value}");
        }
    }));
    *task_probe.lock().unwrap() = Some(Arc::clone(&task));

    scheduler.submit(&task);
    scheduler.wait_for(&task);
    assert_eq!(task.completion().value(), 0);

    // Drop the self-reference so the set can be freed.
    task_probe.lock().unwrap().take();
}
