use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use taskpipe::{ParallelSliceMut, TaskScheduler, TaskSet};

fn main() {
    println!("taskpipe - Work-Stealing Task Scheduler\n");

    let mut scheduler = TaskScheduler::new();
    scheduler.initialize().expect("failed to start workers");
    println!(
        "Initialized scheduler with {} task threads\n",
        scheduler.num_task_threads()
    );

    // Example 1: a simple task set over an index range
    println!("Example 1: Range execution");
    let task = Arc::new(TaskSet::new(16, |range, worker_id| {
        println!("  worker {} handled {:?}", worker_id, range);
    }));
    scheduler.submit(&task);
    scheduler.wait_for(&task);
    println!("  Task set completed\n");

    // Example 2: parallel reduction
    println!("Example 2: Parallel reduction");
    let n = 1_000_000u64;
    let sum = Arc::new(AtomicU64::new(0));
    let sum_clone = sum.clone();

    let start = Instant::now();
    let reduce = Arc::new(TaskSet::new(n as u32, move |range, _| {
        let local: u64 = (range.start as u64..range.end as u64).sum();
        sum_clone.fetch_add(local, Ordering::Relaxed);
    }));
    scheduler.submit(&reduce);
    scheduler.wait_for(&reduce);

    let duration = start.elapsed();
    let expected = n * (n - 1) / 2;
    println!("  Summed 0..{} in {:?}", n, duration);
    println!(
        "  Result: {} (expected: {})\n",
        sum.load(Ordering::Relaxed),
        expected
    );

    // Example 3: parallel slice transform
    println!("Example 3: Slice transform");
    let mut data: Vec<u64> = (0..1_000_000).collect();
    let start = Instant::now();
    data.task_iter_mut(&scheduler).for_each(|x| {
        *x = x.wrapping_mul(2654435761).rotate_left(13);
    });
    println!("  Transformed {} elements in {:?}\n", data.len(), start.elapsed());

    // Example 4: throughput of many small submissions
    println!("Example 4: Submission throughput");
    let num_sets = 10_000;
    let start = Instant::now();
    let mut tasks = Vec::with_capacity(num_sets);
    for _ in 0..num_sets {
        let task = Arc::new(TaskSet::new(64, |range, _| {
            let mut acc = 0u64;
            for i in range {
                acc = acc.wrapping_add(i as u64);
            }
            std::hint::black_box(acc);
        }));
        scheduler.submit(&task);
        tasks.push(task);
    }
    for task in &tasks {
        scheduler.wait_for(task);
    }
    let duration = start.elapsed();
    println!(
        "  Completed {} task sets in {:?} ({:.0} sets/second)\n",
        num_sets,
        duration,
        num_sets as f64 / duration.as_secs_f64()
    );

    println!("Shutting down...");
    match scheduler.wait_for_all_and_shutdown() {
        Ok(()) => println!("Done!"),
        Err(e) => eprintln!("Shutdown error: {}", e),
    }
}
