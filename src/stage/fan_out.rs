use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::LifecycleError;
use crate::metric::Metric;
use crate::msg::Msg;
use crate::queue::{AttachedOutput, QueueReader, QueueWriter};

use super::core::StageCore;
use super::erased::PipelineStage;
use super::state::{StageRole, StageState};

/// Splits a `Vec<E>` into one message per element. The incoming metadata
/// map is cloned once per emitted element rather than shared by reference
/// across all of them; see `DESIGN.md` for why.
pub struct FanOut<E: Send + 'static> {
    core: StageCore<Vec<E>, E>,
}

impl<E: Send + Sync + 'static> FanOut<E> {
    pub fn new(name: impl Into<Arc<str>>, worker_count: usize, metric: Arc<dyn Metric>) -> Self {
        Self {
            core: StageCore::new(name, worker_count, metric),
        }
    }
}

#[async_trait]
impl<E: Send + Sync + 'static> PipelineStage for FanOut<E> {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn role(&self) -> StageRole {
        StageRole::FanOut
    }

    fn state(&self) -> StageState {
        self.core.state.get()
    }

    fn started(&self) -> bool {
        self.core.state.started()
    }

    fn input_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<Vec<E>>())
    }

    fn output_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<E>())
    }

    fn attach_output(&mut self, queue_name: Arc<str>, capacity: usize) -> Result<AttachedOutput, LifecycleError> {
        let (writer, reader): (QueueWriter<E>, _) = crate::queue::bounded(queue_name, capacity);
        let probe = writer.probe();
        self.core.output = Some(writer);
        self.core.state.mark_ready()?;
        Ok(AttachedOutput {
            reader: Box::new(reader),
            probe,
        })
    }

    fn attach_input(&mut self, reader: Box<dyn Any + Send>) -> Result<(), LifecycleError> {
        let reader = *reader.downcast::<QueueReader<Vec<E>>>().map_err(|_| {
            LifecycleError::NotReady(format!("stage '{}' was given an input queue of the wrong type", self.core.name))
        })?;
        self.core.input = Some(reader);
        self.core.state.mark_ready()
    }

    async fn start(&mut self) -> Result<(), LifecycleError> {
        if !self.core.state.begin_start()? {
            return Ok(());
        }
        let input = self.core.input.clone().expect("fan-out input attached before start");
        let output = self.core.output.clone().expect("fan-out output attached before start");
        for worker_idx in 0..self.core.worker_count {
            let stop_token = self.core.stop_token.clone();
            let metric = self.core.metric.clone();
            let name = self.core.name.clone();
            let input = input.clone();
            let output = output.clone();
            let span = tracing::info_span!("stage_worker", stage = %name, worker = worker_idx);
            let handle = tokio::spawn(run_worker(name, metric, input, output, stop_token).instrument(span));
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

async fn run_worker<E: Send + 'static>(
    name: Arc<str>,
    metric: Arc<dyn Metric>,
    input: QueueReader<Vec<E>>,
    output: QueueWriter<E>,
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

                let Msg { data, metadata } = msg;
                for element in data {
                    let env = Msg::new(element, metadata.clone());
                    if output.send(env).await.is_err() {
                        return;
                    }
                    metric.produced(&name);
                }
            }
        }
    }
}
