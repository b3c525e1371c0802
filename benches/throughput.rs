//! Range-execution throughput benchmark using criterion.
//!
//! Measures how fast the scheduler can chew through data-parallel sets of
//! varying size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use taskpipe::{TaskScheduler, TaskSet};

fn bench_range_throughput(c: &mut Criterion) {
    let num_threads = num_cpus::get() as u32;
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(num_threads).unwrap();

    // Warmup
    let warmup = Arc::new(TaskSet::new(10_000, |_, _| {
        std::hint::black_box(());
    }));
    scheduler.submit(&warmup);
    scheduler.wait_for(&warmup);

    let mut group = c.benchmark_group("range_throughput");

    for set_size in [1_000u32, 100_000, 1_000_000] {
        group.throughput(Throughput::Elements(set_size as u64));

        group.bench_function(BenchmarkId::new("sum", set_size), |b| {
            b.iter(|| {
                let total = Arc::new(AtomicU64::new(0));
                let total_clone = total.clone();
                let task = Arc::new(TaskSet::new(set_size, move |range, _| {
                    let local: u64 = (range.start as u64..range.end as u64).sum();
                    total_clone.fetch_add(local, Ordering::Relaxed);
                }));

                scheduler.submit(&task);
                scheduler.wait_for(&task);

                std::hint::black_box(total.load(Ordering::Relaxed));
            })
        });
    }

    group.finish();
}

fn bench_submission_rate(c: &mut Criterion) {
    let num_threads = num_cpus::get() as u32;
    let mut scheduler = TaskScheduler::new();
    scheduler.initialize_with_threads(num_threads).unwrap();

    let mut group = c.benchmark_group("submission_rate");
    group.sample_size(20);

    for num_sets in [100usize, 1_000] {
        group.throughput(Throughput::Elements(num_sets as u64));

        group.bench_function(BenchmarkId::new("small_sets", num_sets), |b| {
            b.iter(|| {
                let tasks: Vec<_> = (0..num_sets)
                    .map(|_| {
                        Arc::new(TaskSet::new(64, |range, _| {
                            let mut acc = 0u64;
                            for i in range {
                                acc = acc.wrapping_add(i as u64);
                            }
                            std::hint::black_box(acc);
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
    }

    group.finish();
}

criterion_group!(benches, bench_range_throughput, bench_submission_rate);
criterion_main!(benches);
