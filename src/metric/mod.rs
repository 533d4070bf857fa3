//! Observability hooks a stage calls on every consume/produce/task outcome.

use std::time::Instant;

mod in_memory;
mod null;
mod prometheus_sink;

pub use in_memory::InMemoryMetric;
pub use null::NullMetric;
pub use prometheus_sink::PrometheusMetric;

/// Implemented by every metric sink a pipeline can be wired to. All methods
/// take `&self`, not `&mut self`: implementations own their interior
/// mutability so a single `Arc<dyn Metric>` can be shared across every
/// worker in every stage.
pub trait Metric: Send + Sync {
    /// A queue's depth, sampled either right after a stage pulls a message
    /// or periodically by a [`crate::watcher::QueueGaugeWatcher`].
    fn enqueued(&self, queue_name: &str, depth: usize);
    fn consumed(&self, stage_name: &str);
    fn produced(&self, stage_name: &str);
    fn task_run(&self, stage_name: &str);
    fn task_success(&self, stage_name: &str);
    fn task_error(&self, stage_name: &str);
    fn task_latency(&self, stage_name: &str, start: Instant, end: Instant);
}
