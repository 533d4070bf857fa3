//! Throughput benchmarks for the stage-pipeline runtime.
//!
//! Run with: cargo bench

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tokio::runtime::Runtime;

use flowline::{Executor, FnTask, Metadata, Metric, NullMetric, Stage, StageSpec, TaskError};

/// A producer feeding a single transform feeding a consumer, run to
/// completion for a fixed message count, at varying queue capacities.
fn bench_transform_chain_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("transform_chain_throughput");
    group.throughput(Throughput::Elements(10_000));

    for capacity in [8usize, 64, 1024] {
        group.bench_with_input(format!("capacity_{capacity}"), &capacity, |b, &capacity| {
            b.iter(|| {
                rt.block_on(async {
                    let metric: Arc<dyn Metric> = Arc::new(NullMetric);
                    let total = 10_000u64;
                    let emitted = Arc::new(AtomicU64::new(0));
                    let emitted_for_task = emitted.clone();
                    let done = Arc::new(tokio::sync::Notify::new());
                    let done_for_task = done.clone();

                    let producer = Stage::producer(
                        "gen",
                        Arc::new(FnTask(move |_: (), _: &mut Metadata| {
                            Ok::<u64, TaskError>(emitted_for_task.fetch_add(1, Ordering::Relaxed))
                        })),
                        1,
                        metric.clone(),
                        Duration::from_nanos(1),
                    );
                    let double = Stage::transform(
                        "double",
                        Arc::new(FnTask(|n: u64, _: &mut Metadata| Ok::<u64, TaskError>(n.wrapping_mul(2)))),
                        2,
                        metric.clone(),
                    );
                    let received = Arc::new(AtomicU64::new(0));
                    let received_for_task = received.clone();
                    let sink = Stage::consumer(
                        "sink",
                        Arc::new(FnTask(move |_: u64, _: &mut Metadata| {
                            if received_for_task.fetch_add(1, Ordering::Relaxed) + 1 >= total {
                                done_for_task.notify_one();
                            }
                            Ok::<(), TaskError>(())
                        })),
                        2,
                        metric.clone(),
                    );

                    let mut executor = Executor::new([
                        StageSpec::with_capacity(producer, capacity),
                        StageSpec::with_capacity(double, capacity),
                        StageSpec::new(sink),
                    ])
                    .unwrap();
                    executor.start().await.unwrap();
                    done.notified().await;
                    executor.stop().await;
                    black_box(received.load(Ordering::Relaxed));
                });
            });
        });
    }
    group.finish();
}

/// Raw queue send/receive throughput, isolated from stage/task overhead.
fn bench_queue_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("queue_throughput");
    group.throughput(Throughput::Elements(10_000));

    for capacity in [100usize, 1_000, 10_000] {
        group.bench_with_input(format!("capacity_{capacity}"), &capacity, |b, &capacity| {
            b.iter(|| {
                rt.block_on(async {
                    let (tx, rx) = flowline::queue::bounded::<u64>("bench", capacity);
                    let producer = tokio::spawn(async move {
                        for i in 0..10_000u64 {
                            tx.send(flowline::Msg::with_empty_metadata(i)).await.unwrap();
                        }
                    });
                    let consumer = tokio::spawn(async move {
                        let mut count = 0u64;
                        while rx.recv().await.is_some() {
                            count += 1;
                            if count == 10_000 {
                                break;
                            }
                        }
                        count
                    });
                    let (_, count) = tokio::join!(producer, consumer);
                    black_box(count.unwrap());
                });
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transform_chain_throughput, bench_queue_throughput);
criterion_main!(benches);
