//! The four stage shapes a pipeline is built from.

mod consumer;
mod core;
mod erased;
mod fan_out;
mod producer;
mod state;
mod transform;

use std::sync::Arc;
use std::time::Duration;

pub use consumer::Consumer;
pub use erased::PipelineStage;
pub use fan_out::FanOut;
pub use producer::Producer;
pub use state::{StageRole, StageState};
pub use transform::Transform;

use crate::metric::Metric;
use crate::task::Task;

/// Constructors that box a concrete stage behind `dyn PipelineStage`,
/// ready to hand to an [`crate::executor::Executor`].
pub struct Stage;

impl Stage {
    pub fn producer<O>(
        name: impl Into<Arc<str>>,
        task: Arc<dyn Task<(), O>>,
        worker_count: usize,
        metric: Arc<dyn Metric>,
        trigger_interval: Duration,
    ) -> Box<dyn PipelineStage>
    where
        O: Send + Sync + 'static,
    {
        Box::new(Producer::new(name, task, worker_count, metric, trigger_interval))
    }

    pub fn transform<I, O>(
        name: impl Into<Arc<str>>,
        task: Arc<dyn Task<I, O>>,
        worker_count: usize,
        metric: Arc<dyn Metric>,
    ) -> Box<dyn PipelineStage>
    where
        I: Send + Sync + 'static,
        O: Send + Sync + 'static,
    {
        Box::new(Transform::new(name, task, worker_count, metric))
    }

    pub fn fan_out<E>(name: impl Into<Arc<str>>, worker_count: usize, metric: Arc<dyn Metric>) -> Box<dyn PipelineStage>
    where
        E: Send + Sync + 'static,
    {
        Box::new(FanOut::<E>::new(name, worker_count, metric))
    }

    pub fn consumer<I, O>(
        name: impl Into<Arc<str>>,
        task: Arc<dyn Task<I, O>>,
        worker_count: usize,
        metric: Arc<dyn Metric>,
    ) -> Box<dyn PipelineStage>
    where
        I: Send + Sync + 'static,
        O: Send + Sync + 'static,
    {
        Box::new(Consumer::new(name, task, worker_count, metric))
    }
}
