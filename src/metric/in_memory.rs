use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::Metric;

#[derive(Default)]
struct Counters {
    enqueued: HashMap<String, usize>,
    consumed: HashMap<String, u64>,
    produced: HashMap<String, u64>,
    task_run: HashMap<String, u64>,
    task_success: HashMap<String, u64>,
    task_error: HashMap<String, u64>,
    task_latency: HashMap<String, Vec<Duration>>,
}

/// Records every observation in memory, for assertions in tests. Each call
/// takes an uncontended lock; not meant for production load.
#[derive(Default)]
pub struct InMemoryMetric(Mutex<Counters>);

impl InMemoryMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_enqueued_depth(&self, queue_name: &str) -> Option<usize> {
        self.0.lock().enqueued.get(queue_name).copied()
    }

    pub fn consumed_count(&self, stage_name: &str) -> u64 {
        *self.0.lock().consumed.get(stage_name).unwrap_or(&0)
    }

    pub fn produced_count(&self, stage_name: &str) -> u64 {
        *self.0.lock().produced.get(stage_name).unwrap_or(&0)
    }

    pub fn task_run_count(&self, stage_name: &str) -> u64 {
        *self.0.lock().task_run.get(stage_name).unwrap_or(&0)
    }

    pub fn task_success_count(&self, stage_name: &str) -> u64 {
        *self.0.lock().task_success.get(stage_name).unwrap_or(&0)
    }

    pub fn task_error_count(&self, stage_name: &str) -> u64 {
        *self.0.lock().task_error.get(stage_name).unwrap_or(&0)
    }

    pub fn latency_samples(&self, stage_name: &str) -> usize {
        self.0
            .lock()
            .task_latency
            .get(stage_name)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Metric for InMemoryMetric {
    fn enqueued(&self, queue_name: &str, depth: usize) {
        self.0.lock().enqueued.insert(queue_name.to_string(), depth);
    }

    fn consumed(&self, stage_name: &str) {
        *self.0.lock().consumed.entry(stage_name.to_string()).or_default() += 1;
    }

    fn produced(&self, stage_name: &str) {
        *self.0.lock().produced.entry(stage_name.to_string()).or_default() += 1;
    }

    fn task_run(&self, stage_name: &str) {
        *self.0.lock().task_run.entry(stage_name.to_string()).or_default() += 1;
    }

    fn task_success(&self, stage_name: &str) {
        *self.0.lock().task_success.entry(stage_name.to_string()).or_default() += 1;
    }

    fn task_error(&self, stage_name: &str) {
        *self.0.lock().task_error.entry(stage_name.to_string()).or_default() += 1;
    }

    fn task_latency(&self, stage_name: &str, start: Instant, end: Instant) {
        self.0
            .lock()
            .task_latency
            .entry(stage_name.to_string())
            .or_default()
            .push(end.saturating_duration_since(start));
    }
}
