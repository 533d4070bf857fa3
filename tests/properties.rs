//! Property-based tests for laws the pipeline is expected to uphold
//! regardless of the exact messages that flow through it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowline::{Executor, FnTask, InMemoryMetric, Metadata, Metric, Stage, StageSpec};
use proptest::prelude::*;
use serde_json::json;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

proptest! {
    /// Metadata only ever grows as a message crosses transforms: a key a
    /// transform wrote is still present (and unchanged) after the next
    /// transform runs, no matter how many hops happen.
    #[test]
    fn metadata_accumulates_monotonically(hop_count in 1usize..6) {
        block_on(async move {
            let metric: Arc<dyn Metric> = Arc::new(InMemoryMetric::new());
            let finished: Arc<std::sync::Mutex<Option<Metadata>>> = Arc::new(std::sync::Mutex::new(None));
            let finished_for_task = finished.clone();

            let producer = Stage::producer(
                "gen",
                Arc::new(FnTask(|_: (), _: &mut Metadata| Ok(0u64))),
                1,
                metric.clone(),
                Duration::from_millis(500),
            );

            let mut specs = vec![StageSpec::new(producer)];
            for hop in 0..hop_count {
                let key = format!("hop_{hop}");
                let task = Arc::new(FnTask(move |n: u64, meta: &mut Metadata| {
                    meta.insert(key.clone(), json!(true));
                    Ok::<u64, flowline::TaskError>(n + 1)
                }));
                specs.push(StageSpec::new(Stage::transform(format!("hop{hop}"), task, 1, metric.clone())));
            }
            specs.push(StageSpec::new(Stage::consumer(
                "sink",
                Arc::new(FnTask(move |_: u64, meta: &mut Metadata| {
                    *finished_for_task.lock().unwrap() = Some(meta.clone());
                    Ok::<(), flowline::TaskError>(())
                })),
                1,
                metric.clone(),
            )));

            let mut executor = Executor::new(specs).unwrap();
            executor.start().await.unwrap();
            tokio::time::sleep(Duration::from_millis(80)).await;
            executor.stop().await;

            let meta = finished.lock().unwrap().clone().expect("sink should have seen at least one message");
            for hop in 0..hop_count {
                prop_assert_eq!(meta.get(&format!("hop_{hop}")), Some(&json!(true)));
            }
            Ok(())
        })?;
    }

    /// A fan-out stage emits exactly as many messages downstream as the
    /// length of the `Vec` it was handed, for any non-negative size.
    #[test]
    fn fan_out_emits_exactly_len_messages(size in 0usize..20) {
        block_on(async move {
            let metric: Arc<dyn Metric> = Arc::new(InMemoryMetric::new());
            let count = Arc::new(AtomicUsize::new(0));
            let count_for_task = count.clone();

            let elements: Vec<u64> = (0..size as u64).collect();
            let producer = Stage::producer::<Vec<u64>>(
                "gen",
                Arc::new(FnTask(move |_: (), _: &mut Metadata| Ok(elements.clone()))),
                1,
                metric.clone(),
                Duration::from_millis(500),
            );
            let split = Stage::fan_out::<u64>("split", 1, metric.clone());
            let sink = Stage::consumer(
                "sink",
                Arc::new(FnTask(move |_: u64, _: &mut Metadata| {
                    count_for_task.fetch_add(1, Ordering::Relaxed);
                    Ok::<(), flowline::TaskError>(())
                })),
                1,
                metric.clone(),
            );

            let mut executor = Executor::new([StageSpec::new(producer), StageSpec::new(split), StageSpec::new(sink)]).unwrap();
            executor.start().await.unwrap();
            tokio::time::sleep(Duration::from_millis(80)).await;
            executor.stop().await;

            prop_assert_eq!(count.load(Ordering::Relaxed), size);
            Ok(())
        })?;
    }
}
