use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::StreamExt;
use std::time::Instant;
use tokio::runtime::Builder;
use weir::{PoolConfig, ResultStream, WorkerPool, merge, queue, sink, transform};

// Number of items pushed through the pool per benchmark iteration.
const TOTAL_ITEMS: u64 = 4096 * 16;

/// Pushes `TOTAL_ITEMS` through a fresh pool and drains the results.
async fn run_pool(num_workers: usize, capacity: usize) {
    let (producer, tasks) = queue::bounded(capacity);
    let (results_tx, results) = sink::bounded(capacity);
    let pool = WorkerPool::start(
        &PoolConfig::new(num_workers),
        tasks,
        results_tx,
        transform::from_fn(|n: u64| n.wrapping_mul(n)),
    )
    .unwrap();

    tokio::spawn(async move {
        for n in 0..TOTAL_ITEMS {
            producer.send(n).await.unwrap();
        }
    });

    while let Some(r) = results.recv().await {
        black_box(r);
    }
    pool.join().await.unwrap();
}

/// Benchmarks pool throughput for a range of worker counts.
fn bench_pool_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/workers");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);
    group.throughput(Throughput::Elements(TOTAL_ITEMS));

    for num_workers in [1, 2, 4, 8, 16, 32] {
        group.bench_function(
            format!("elems/{}/workers/{}", TOTAL_ITEMS, num_workers),
            |b| {
                let rt = Builder::new_multi_thread().enable_all().build().unwrap();

                b.to_async(&rt).iter_custom(move |iters| async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        run_pool(num_workers, 64).await;
                    }
                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks how queue and sink capacity affect a fixed pool.
fn bench_pool_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/capacity");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);
    group.throughput(Throughput::Elements(TOTAL_ITEMS));

    for capacity in [0, 1, 16, 256, 4096] {
        group.bench_function(
            format!("elems/{}/capacity/{}", TOTAL_ITEMS, capacity),
            |b| {
                let rt = Builder::new_multi_thread().enable_all().build().unwrap();

                b.to_async(&rt).iter_custom(move |iters| async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        run_pool(4, capacity).await;
                    }
                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks merging many pre-filled streams into one.
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);
    group.throughput(Throughput::Elements(TOTAL_ITEMS));

    for num_sources in [2, 8, 64] {
        let per_source = TOTAL_ITEMS / num_sources as u64;

        group.bench_function(
            format!("elems/{}/sources/{}", TOTAL_ITEMS, num_sources),
            |b| {
                let rt = Builder::new_multi_thread().enable_all().build().unwrap();

                b.to_async(&rt).iter_custom(move |iters| async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        let sources: Vec<ResultStream<u64>> = (0..num_sources)
                            .map(|_| {
                                let (tx, rx) = queue::bounded(64);
                                tokio::spawn(async move {
                                    for n in 0..per_source {
                                        tx.send(n).await.unwrap();
                                    }
                                });
                                stage_passthrough(rx)
                            })
                            .collect();

                        let merged = merge(sources, 64);
                        black_box(merged.count().await);
                    }
                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

fn stage_passthrough(tasks: weir::TaskQueue<u64>) -> ResultStream<u64> {
    let (_stage, results) = weir::stage(tasks, 64, transform::from_fn(|n: u64| n)).unwrap();
    results
}

criterion_group!(
    benches,
    bench_pool_workers,
    bench_pool_capacity,
    bench_merge
);
criterion_main!(benches);
