use std::time::Instant;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use super::Metric;

/// Production metric sink backed by a `prometheus::Registry`.
///
/// Unlike the teacher pipeline this crate is descended from, the registry
/// is owned by the instance rather than stashed in process-wide
/// `once_cell` statics: a program can run more than one pipeline, each
/// with its own metric namespace, without one clobbering the other.
pub struct PrometheusMetric {
    registry: Registry,
    enqueued: IntGaugeVec,
    consumed: IntCounterVec,
    produced: IntCounterVec,
    task_run: IntCounterVec,
    task_success: IntCounterVec,
    task_error: IntCounterVec,
    task_latency: HistogramVec,
}

impl PrometheusMetric {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let enqueued = IntGaugeVec::new(
            Opts::new("flowline_queue_depth", "items currently waiting in a pipeline queue"),
            &["queue"],
        )?;
        let consumed = IntCounterVec::new(
            Opts::new("flowline_consumed_total", "messages pulled off a stage's input queue"),
            &["stage"],
        )?;
        let produced = IntCounterVec::new(
            Opts::new("flowline_produced_total", "messages pushed onto a stage's output queue"),
            &["stage"],
        )?;
        let task_run = IntCounterVec::new(
            Opts::new("flowline_task_run_total", "task invocations started"),
            &["stage"],
        )?;
        let task_success = IntCounterVec::new(
            Opts::new("flowline_task_success_total", "task invocations that returned Ok"),
            &["stage"],
        )?;
        let task_error = IntCounterVec::new(
            Opts::new("flowline_task_error_total", "task invocations that returned Err or panicked"),
            &["stage"],
        )?;
        let task_latency = HistogramVec::new(
            HistogramOpts::new("flowline_task_latency_seconds", "task execution latency").buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["stage"],
        )?;

        registry.register(Box::new(enqueued.clone()))?;
        registry.register(Box::new(consumed.clone()))?;
        registry.register(Box::new(produced.clone()))?;
        registry.register(Box::new(task_run.clone()))?;
        registry.register(Box::new(task_success.clone()))?;
        registry.register(Box::new(task_error.clone()))?;
        registry.register(Box::new(task_latency.clone()))?;

        Ok(Self {
            registry,
            enqueued,
            consumed,
            produced,
            task_run,
            task_success,
            task_error,
            task_latency,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every metric in this registry as Prometheus text exposition
    /// format, for a `/metrics` HTTP handler.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(error) = encoder.encode(&families, &mut buffer) {
            tracing::error!(%error, "failed to encode prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Metric for PrometheusMetric {
    fn enqueued(&self, queue_name: &str, depth: usize) {
        self.enqueued.with_label_values(&[queue_name]).set(depth as i64);
    }

    fn consumed(&self, stage_name: &str) {
        self.consumed.with_label_values(&[stage_name]).inc();
    }

    fn produced(&self, stage_name: &str) {
        self.produced.with_label_values(&[stage_name]).inc();
    }

    fn task_run(&self, stage_name: &str) {
        self.task_run.with_label_values(&[stage_name]).inc();
    }

    fn task_success(&self, stage_name: &str) {
        self.task_success.with_label_values(&[stage_name]).inc();
    }

    fn task_error(&self, stage_name: &str) {
        self.task_error.with_label_values(&[stage_name]).inc();
    }

    fn task_latency(&self, stage_name: &str, start: Instant, end: Instant) {
        self.task_latency
            .with_label_values(&[stage_name])
            .observe(end.saturating_duration_since(start).as_secs_f64());
    }
}
