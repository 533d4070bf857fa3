//! End-to-end pipeline scenarios, driven entirely through the public
//! `flowline` API against an `InMemoryMetric` sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowline::{Executor, FnTask, InMemoryMetric, Metadata, Metric, Stage, StageSpec, TaskError, TopologyError};

fn counter_task(start_at: u64) -> FnTask<impl Fn((), &mut Metadata) -> Result<u64, TaskError>> {
    let next = AtomicU64::new(start_at);
    FnTask(move |_: (), _: &mut Metadata| Ok(next.fetch_add(1, Ordering::Relaxed)))
}

/// S1: a straight producer -> transform -> consumer chain delivers every
/// message and the consumer sees them in non-decreasing order.
#[tokio::test]
async fn echo_pipeline_delivers_every_message_in_order() {
    let metric = Arc::new(InMemoryMetric::new());
    let seen: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_for_task = seen.clone();

    let producer = Stage::producer(
        "gen",
        Arc::new(counter_task(0)),
        1,
        metric.clone() as Arc<dyn Metric>,
        Duration::from_millis(2),
    );
    let sink = Stage::consumer(
        "sink",
        Arc::new(FnTask(move |n: u64, _: &mut Metadata| -> Result<(), TaskError> {
            seen_for_task.lock().unwrap().push(n);
            Ok(())
        })),
        1,
        metric.clone() as Arc<dyn Metric>,
    );

    let mut executor = Executor::new([StageSpec::new(producer), StageSpec::new(sink)]).unwrap();
    executor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    executor.stop().await;

    let observed = seen.lock().unwrap().clone();
    assert!(observed.len() >= 5, "expected several messages, got {observed:?}");
    assert!(observed.windows(2).all(|w| w[0] < w[1]), "messages went out of order: {observed:?}");
    assert_eq!(metric.task_error_count("sink"), 0);
}

/// S2: a fan-out stage splits one `Vec<T>` message into `len(Vec)`
/// single-element messages, each carrying its own cloned metadata.
#[tokio::test]
async fn fan_out_splits_one_message_into_many() {
    let metric = Arc::new(InMemoryMetric::new());
    let received: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let received_for_task = received.clone();

    let producer = Stage::producer::<Vec<u64>>(
        "gen",
        Arc::new(FnTask(|_: (), _: &mut Metadata| Ok(vec![1, 2, 3, 4, 5]))),
        1,
        metric.clone() as Arc<dyn Metric>,
        Duration::from_millis(500),
    );
    let split = Stage::fan_out::<u64>("split", 2, metric.clone() as Arc<dyn Metric>);
    let sink = Stage::consumer(
        "sink",
        Arc::new(FnTask(move |n: u64, _: &mut Metadata| -> Result<(), TaskError> {
            received_for_task.lock().unwrap().push(n);
            Ok(())
        })),
        2,
        metric.clone() as Arc<dyn Metric>,
    );

    let mut executor = Executor::new([StageSpec::new(producer), StageSpec::new(split), StageSpec::new(sink)]).unwrap();
    executor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    executor.stop().await;

    let mut observed = received.lock().unwrap().clone();
    observed.sort_unstable();
    assert_eq!(observed, vec![1, 2, 3, 4, 5]);
}

/// S3: a task that returns an error is counted and logged, but never
/// takes down its worker loop — later messages still get through.
#[tokio::test]
async fn failing_task_is_isolated_and_later_messages_still_flow() {
    let metric = Arc::new(InMemoryMetric::new());
    let succeeded: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let succeeded_for_task = succeeded.clone();

    let producer = Stage::producer(
        "gen",
        Arc::new(counter_task(0)),
        1,
        metric.clone() as Arc<dyn Metric>,
        Duration::from_millis(2),
    );
    let flaky = Stage::transform(
        "flaky",
        Arc::new(FnTask(|n: u64, _: &mut Metadata| -> Result<u64, TaskError> {
            if n % 3 == 0 {
                anyhow::bail!("divisible by three");
            }
            Ok(n)
        })),
        1,
        metric.clone() as Arc<dyn Metric>,
    );
    let sink = Stage::consumer(
        "sink",
        Arc::new(FnTask(move |n: u64, _: &mut Metadata| -> Result<(), TaskError> {
            succeeded_for_task.lock().unwrap().push(n);
            Ok(())
        })),
        1,
        metric.clone() as Arc<dyn Metric>,
    );

    let mut executor = Executor::new([StageSpec::new(producer), StageSpec::new(flaky), StageSpec::new(sink)]).unwrap();
    executor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    executor.stop().await;

    assert!(metric.task_error_count("flaky") > 0, "expected at least one failure");
    assert!(succeeded.lock().unwrap().iter().all(|n| n % 3 != 0));
    assert!(!succeeded.lock().unwrap().is_empty(), "non-failing messages should still reach the sink");
}

/// S4: a downstream stage slower than upstream fills its input queue
/// instead of buffering without bound; the producer observes its sends
/// taking longer once the queue is full.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_consumer_creates_backpressure_instead_of_unbounded_growth() {
    let metric = Arc::new(InMemoryMetric::new());

    let producer = Stage::producer(
        "gen",
        Arc::new(counter_task(0)),
        1,
        metric.clone() as Arc<dyn Metric>,
        Duration::from_millis(1),
    );
    let sink = Stage::consumer(
        "slow_sink",
        Arc::new(FnTask(|_: u64, _: &mut Metadata| -> Result<(), TaskError> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(())
        })),
        1,
        metric.clone() as Arc<dyn Metric>,
    );

    let mut executor = Executor::new([
        StageSpec::with_capacity(producer, 2),
        StageSpec::new(sink),
    ])
    .unwrap();
    executor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let handles = executor.queue_handles();
    let probe = handles.values().next().unwrap();
    assert!(probe.depth() <= probe.capacity(), "queue depth must never exceed its capacity");

    executor.stop().await;
}

/// S5: an invalid stage list is rejected at `Executor::new`, before any
/// stage has ever run.
#[tokio::test]
async fn invalid_topology_is_rejected_before_anything_starts() {
    let metric: Arc<dyn Metric> = Arc::new(InMemoryMetric::new());
    let lone_transform = Stage::transform(
        "orphan",
        Arc::new(FnTask(|n: u64, _: &mut Metadata| -> Result<u64, TaskError> { Ok(n) })),
        1,
        metric,
    );
    let err = Executor::new([StageSpec::new(lone_transform)]).unwrap_err();
    assert!(matches!(err, TopologyError::FirstStageNotProducer(_)));
}

/// S6: stopping an executor cancels every worker loop and `stop` returns
/// only once they have all exited; calling it twice is harmless.
#[tokio::test]
async fn stop_is_clean_and_idempotent() {
    let metric: Arc<dyn Metric> = Arc::new(InMemoryMetric::new());
    let producer = Stage::producer(
        "gen",
        Arc::new(counter_task(0)),
        2,
        metric.clone(),
        Duration::from_millis(1),
    );
    let sink = Stage::consumer(
        "sink",
        Arc::new(FnTask(|_: u64, _: &mut Metadata| -> Result<(), TaskError> { Ok(()) })),
        2,
        metric,
    );

    let mut executor = Executor::new([StageSpec::new(producer), StageSpec::new(sink)]).unwrap();
    executor.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    executor.stop().await;
    assert!(!executor.started());
    executor.stop().await;
}
