use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::context::Context;
use crate::error::LifecycleError;
use crate::metric::Metric;
use crate::msg::Msg;
use crate::queue::{AttachedOutput, QueueReader, QueueWriter};
use crate::task::{self, Task};

use super::core::StageCore;
use super::erased::PipelineStage;
use super::state::{StageRole, StageState};

/// Pulls one message, runs a `Task<I, O>` on it, and pushes the result.
/// Each of its workers is a persistent loop (recv -> run -> send -> loop)
/// rather than a spawn-per-message pool, so within a single worker the
/// output for message N is always pushed before message N+1 is pulled.
pub struct Transform<I: Send + 'static, O: Send + 'static> {
    core: StageCore<I, O>,
    task: Arc<dyn Task<I, O>>,
}

impl<I: Send + Sync + 'static, O: Send + Sync + 'static> Transform<I, O> {
    pub fn new(name: impl Into<Arc<str>>, task: Arc<dyn Task<I, O>>, worker_count: usize, metric: Arc<dyn Metric>) -> Self {
        Self {
            core: StageCore::new(name, worker_count, metric),
            task,
        }
    }
}

#[async_trait]
impl<I: Send + Sync + 'static, O: Send + Sync + 'static> PipelineStage for Transform<I, O> {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn role(&self) -> StageRole {
        StageRole::Transform
    }

    fn state(&self) -> StageState {
        self.core.state.get()
    }

    fn started(&self) -> bool {
        self.core.state.started()
    }

    fn input_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<I>())
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

    fn attach_input(&mut self, reader: Box<dyn Any + Send>) -> Result<(), LifecycleError> {
        let reader = *reader.downcast::<QueueReader<I>>().map_err(|_| {
            LifecycleError::NotReady(format!("stage '{}' was given an input queue of the wrong type", self.core.name))
        })?;
        self.core.input = Some(reader);
        self.core.state.mark_ready()
    }

    async fn start(&mut self) -> Result<(), LifecycleError> {
        if !self.core.state.begin_start()? {
            return Ok(());
        }
        let input = self.core.input.clone().expect("transform input attached before start");
        let output = self.core.output.clone().expect("transform output attached before start");
        for worker_idx in 0..self.core.worker_count {
            let stop_token = self.core.stop_token.clone();
            let metric = self.core.metric.clone();
            let task = self.task.clone();
            let name = self.core.name.clone();
            let input = input.clone();
            let output = output.clone();
            let span = tracing::info_span!("stage_worker", stage = %name, worker = worker_idx);
            let handle = tokio::spawn(run_worker(name, task, metric, input, output, stop_token).instrument(span));
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

async fn run_worker<I: Send + 'static, O: Send + 'static>(
    name: Arc<str>,
    task: Arc<dyn Task<I, O>>,
    metric: Arc<dyn Metric>,
    input: QueueReader<I>,
    output: QueueWriter<O>,
    stop_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop_token.cancelled() => break,
            maybe_msg = input.recv() => {
                let Some(msg) = maybe_msg else { break };
                metric.consumed(&name);
                metric.enqueued(input.name(), input.depth());

                let Msg { data, mut metadata } = msg;
                metric.task_run(&name);
                let ctx = Context::child_of(&stop_token);
                let start = Instant::now();
                let result = task::invoke(task.as_ref(), ctx, data, &mut metadata, &name).await;
                metric.task_latency(&name, start, Instant::now());

                match result {
                    Ok(out) => {
                        if output.send(Msg::new(out, metadata)).await.is_err() {
                            break;
                        }
                        metric.task_success(&name);
                        metric.produced(&name);
                    }
                    Err(error) => {
                        metric.task_error(&name);
                        tracing::warn!(stage = %name, %error, "transform task failed");
                    }
                }
            }
        }
    }
}
