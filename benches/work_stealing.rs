//! Work-stealing stress benchmark using criterion.
//!
//! Tests stealing under imbalanced workloads where a fraction of the
//! partitions are far heavier than the rest.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taskpipe::{TaskScheduler, TaskSet};

fn fibonacci(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }
    let mut a = 0u64;
    let mut b = 1u64;
    for _ in 2..=n {
        let temp = a.wrapping_add(b);
        a = b;
        b = temp;
    }
    b
}

fn bench_imbalanced_workload(c: &mut Criterion) {
    let num_threads = num_cpus::get() as u32;
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(num_threads).unwrap();

    let mut group = c.benchmark_group("work_stealing");
    group.sample_size(10);

    for set_size in [10_000u32, 100_000] {
        group.throughput(Throughput::Elements(set_size as u64));

        group.bench_function(BenchmarkId::new("imbalanced", set_size), |b| {
            b.iter(|| {
                let completed = Arc::new(AtomicUsize::new(0));
                let comp = completed.clone();

                let task = Arc::new(TaskSet::new(set_size, move |range, _| {
                    for i in range {
                        // Imbalanced: every 100th index is heavy.
                        let work = if i % 100 == 0 { 1000 } else { 10 };
                        std::hint::black_box(fibonacci(work));
                    }
                    comp.fetch_add(1, Ordering::Relaxed);
                }));

                scheduler.submit(&task);
                scheduler.wait_for(&task);

                std::hint::black_box(completed.load(Ordering::Relaxed));
            })
        });
    }

    group.finish();
}

fn bench_cross_thread_stealing(c: &mut Criterion) {
    // Two threads, everything submitted from the main thread: the worker
    // only ever gets work by stealing from pipe 0.
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(2).unwrap();

    let mut group = c.benchmark_group("steal_path");
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("two_threads", 1_000), |b| {
        b.iter(|| {
            let tasks: Vec<_> = (0..1_000)
                .map(|_| {
                    Arc::new(TaskSet::new(16, |_, _| {
                        std::hint::black_box(fibonacci(50));
                    }))
                })
                .collect();

            for task in &tasks {
                scheduler.submit(task);
            }
            for task in &tasks {
                scheduler.wait_for(task);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_imbalanced_workload, bench_cross_thread_stealing);
criterion_main!(benches);
