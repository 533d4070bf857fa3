use std::time::Instant;

use super::Metric;

/// Discards every observation. Useful when a pipeline's caller has no
/// interest in metrics and doesn't want to pay even the cost of a lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetric;

impl Metric for NullMetric {
    fn enqueued(&self, _queue_name: &str, _depth: usize) {}
    fn consumed(&self, _stage_name: &str) {}
    fn produced(&self, _stage_name: &str) {}
    fn task_run(&self, _stage_name: &str) {}
    fn task_success(&self, _stage_name: &str) {}
    fn task_error(&self, _stage_name: &str) {}
    fn task_latency(&self, _stage_name: &str, _start: Instant, _end: Instant) {}
}
