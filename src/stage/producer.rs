use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::context::Context;
use crate::error::LifecycleError;
use crate::metric::Metric;
use crate::msg::{Metadata, Msg};
use crate::queue::{AttachedOutput, QueueWriter};
use crate::task::{self, Task};

use super::core::StageCore;
use super::erased::PipelineStage;
use super::state::{StageRole, StageState};

/// Originates messages on a timer by repeatedly invoking a `Task<(), O>`.
/// Has no input queue; sits only at the head of a pipeline.
pub struct Producer<O: Send + 'static> {
    core: StageCore<(), O>,
    task: Arc<dyn Task<(), O>>,
    trigger_interval: Duration,
}

impl<O: Send + Sync + 'static> Producer<O> {
    pub fn new(
        name: impl Into<Arc<str>>,
        task: Arc<dyn Task<(), O>>,
        worker_count: usize,
        metric: Arc<dyn Metric>,
        trigger_interval: Duration,
    ) -> Self {
        Self {
            core: StageCore::new(name, worker_count, metric),
            task,
            trigger_interval,
        }
    }
}

#[async_trait]
impl<O: Send + Sync + 'static> PipelineStage for Producer<O> {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn role(&self) -> StageRole {
        StageRole::Producer
    }

    fn state(&self) -> StageState {
        self.core.state.get()
    }

    fn started(&self) -> bool {
        self.core.state.started()
    }

    fn input_type(&self) -> Option<TypeId> {
        None
    }

    fn output_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<O>())
    }

    fn attach_output(&mut self, queue_name: Arc<str>, capacity: usize) -> Result<AttachedOutput, LifecycleError> {
        let (writer, reader): (QueueWriter<O>, _) = crate::queue::bounded(queue_name, capacity);
        let probe = writer.probe();
        self.core.output = Some(writer);
        self.core.state.mark_ready()?;
        Ok(AttachedOutput {
            reader: Box::new(reader),
            probe,
        })
    }

    fn attach_input(&mut self, _reader: Box<dyn Any + Send>) -> Result<(), LifecycleError> {
        Err(LifecycleError::NotReady(format!(
            "producer '{}' has no input queue to attach",
            self.core.name
        )))
    }

    async fn start(&mut self) -> Result<(), LifecycleError> {
        if !self.core.state.begin_start()? {
            return Ok(());
        }
        let output = self.core.output.clone().expect("producer output attached before start");
        for worker_idx in 0..self.core.worker_count {
            let stop_token = self.core.stop_token.clone();
            let metric = self.core.metric.clone();
            let task = self.task.clone();
            let name = self.core.name.clone();
            let trigger_interval = self.trigger_interval;
            let output = output.clone();
            let span = tracing::info_span!("stage_worker", stage = %name, worker = worker_idx);
            let handle = tokio::spawn(
                run_worker(name, task, metric, output, stop_token, trigger_interval).instrument(span),
            );
            self.core.handles.push(handle);
        }
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.core.state.begin_stop() {
            return;
        }
        self.core.stop_token.cancel();
        self.core.join_handles().await;
        self.core.state.finish_stop();
    }
}

async fn run_worker<O: Send + 'static>(
    name: Arc<str>,
    task: Arc<dyn Task<(), O>>,
    metric: Arc<dyn Metric>,
    output: QueueWriter<O>,
    stop_token: CancellationToken,
    trigger_interval: Duration,
) {
    let mut ticker = tokio::time::interval(trigger_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = stop_token.cancelled() => break,
            _ = ticker.tick() => {
                metric.task_run(&name);
                let mut meta = Metadata::new();
                let ctx = Context::child_of(&stop_token);
                let start = Instant::now();
                let result = task::invoke(task.as_ref(), ctx, (), &mut meta, &name).await;
                metric.task_latency(&name, start, Instant::now());

                match result {
                    Ok(data) => {
                        if output.send(Msg::new(data, meta)).await.is_err() {
                            break;
                        }
                        metric.task_success(&name);
                        metric.produced(&name);
                    }
                    Err(error) => {
                        metric.task_error(&name);
                        tracing::warn!(stage = %name, %error, "producer task failed");
                    }
                }
            }
        }
    }
}
