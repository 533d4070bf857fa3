//! Validates a list of stages into a linear pipeline, wires their queues,
//! and drives the start/stop lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LifecycleError, TopologyError};
use crate::queue::QueueProbe;
use crate::stage::{PipelineStage, StageRole};

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A stage plus an optional queue capacity preference for the queue that
/// follows it. When neither a stage nor its successor states a
/// preference, [`DEFAULT_QUEUE_CAPACITY`] is used.
pub struct StageSpec {
    stage: Box<dyn PipelineStage>,
    queue_capacity: Option<usize>,
}

impl StageSpec {
    pub fn new(stage: Box<dyn PipelineStage>) -> Self {
        Self {
            stage,
            queue_capacity: None,
        }
    }

    pub fn with_capacity(stage: Box<dyn PipelineStage>, capacity: usize) -> Self {
        Self {
            stage,
            queue_capacity: Some(capacity),
        }
    }
}

impl From<Box<dyn PipelineStage>> for StageSpec {
    fn from(stage: Box<dyn PipelineStage>) -> Self {
        StageSpec::new(stage)
    }
}

enum ExecutorState {
    Built,
    Running,
    Stopped,
}

/// Owns a validated pipeline's stages and their queue probes.
///
/// Construction (`new`) is where topology is checked: the stage list must
/// start with exactly one producer, end with exactly one consumer, carry
/// no producer or consumer in the middle, have no duplicate names, and
/// have each adjacent pair's output/input types line up. Any violation
/// returns a [`TopologyError`] before a single queue is allocated or a
/// single stage is started.
pub struct Executor {
    stages: Vec<Box<dyn PipelineStage>>,
    queue_probes: HashMap<String, Arc<dyn QueueProbe>>,
    state: ExecutorState,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("stage_count", &self.stages.len())
            .field("queue_count", &self.queue_probes.len())
            .finish()
    }
}

impl Executor {
    pub fn new(specs: impl IntoIterator<Item = StageSpec>) -> Result<Self, TopologyError> {
        let mut specs: Vec<StageSpec> = specs.into_iter().collect();
        if specs.is_empty() {
            return Err(TopologyError::Empty);
        }

        if specs.first().unwrap().stage.role() != StageRole::Producer {
            return Err(TopologyError::FirstStageNotProducer(
                specs.first().unwrap().stage.name().to_string(),
            ));
        }
        if specs.last().unwrap().stage.role() != StageRole::Consumer {
            return Err(TopologyError::LastStageNotConsumer(
                specs.last().unwrap().stage.name().to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for spec in &specs {
            if !seen_names.insert(spec.stage.name().to_string()) {
                return Err(TopologyError::DuplicateName(spec.stage.name().to_string()));
            }
        }

        let last_idx = specs.len() - 1;
        for (idx, spec) in specs.iter().enumerate() {
            let is_boundary = idx == 0 || idx == last_idx;
            let role = spec.stage.role();
            if !is_boundary && matches!(role, StageRole::Producer | StageRole::Consumer) {
                return Err(TopologyError::BoundaryRoleInMiddle(spec.stage.name().to_string(), role));
            }
        }

        for window in specs.windows(2) {
            let (upstream, downstream) = (&window[0], &window[1]);
            match (upstream.stage.output_type(), downstream.stage.input_type()) {
                (Some(a), Some(b)) if a == b => {}
                _ => {
                    return Err(TopologyError::TypeMismatch {
                        upstream: upstream.stage.name().to_string(),
                        downstream: downstream.stage.name().to_string(),
                    })
                }
            }
        }

        let mut queue_probes = HashMap::new();
        for i in 0..specs.len() - 1 {
            let capacity = specs[i + 1]
                .queue_capacity
                .or(specs[i].queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY);
            let upstream_name = specs[i].stage.name().to_string();
            let downstream_name = specs[i + 1].stage.name().to_string();
            let queue_name: Arc<str> = format!("{upstream_name}->{downstream_name}").into();

            let attached = specs[i]
                .stage
                .attach_output(queue_name.clone(), capacity)
                .map_err(|_| TopologyError::TypeMismatch {
                    upstream: upstream_name.clone(),
                    downstream: downstream_name.clone(),
                })?;
            specs[i + 1]
                .stage
                .attach_input(attached.reader)
                .map_err(|_| TopologyError::TypeMismatch {
                    upstream: upstream_name,
                    downstream: downstream_name,
                })?;
            queue_probes.insert(queue_name.to_string(), attached.probe);
        }

        let stages = specs.into_iter().map(|spec| spec.stage).collect();
        Ok(Self {
            stages,
            queue_probes,
            state: ExecutorState::Built,
        })
    }

    /// Starts every stage in topology order. Idempotent once running.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            ExecutorState::Running => return Ok(()),
            ExecutorState::Stopped => return Err(LifecycleError::AlreadyStopped("executor".to_string())),
            ExecutorState::Built => {}
        }
        for stage in &mut self.stages {
            stage.start().await?;
        }
        self.state = ExecutorState::Running;
        Ok(())
    }

    /// Stops every stage and waits for every worker loop to exit. A
    /// stopped executor cannot be restarted. Idempotent.
    pub async fn stop(&mut self) {
        if matches!(self.state, ExecutorState::Stopped) {
            return;
        }
        for stage in &mut self.stages {
            stage.stop().await;
        }
        self.state = ExecutorState::Stopped;
    }

    /// As [`Executor::stop`], but gives up waiting for worker loops after
    /// `deadline` instead of blocking forever on a stuck task.
    pub async fn stop_with_deadline(&mut self, deadline: Duration) {
        if matches!(self.state, ExecutorState::Stopped) {
            return;
        }
        let _ = tokio::time::timeout(deadline, async {
            for stage in &mut self.stages {
                stage.stop().await;
            }
        })
        .await;
        self.state = ExecutorState::Stopped;
    }

    /// One probe per inter-stage queue, keyed by `"<upstream>-><downstream>"`,
    /// for a [`crate::watcher::QueueGaugeWatcher`] or direct inspection.
    pub fn queue_handles(&self) -> HashMap<String, Arc<dyn QueueProbe>> {
        self.queue_probes.clone()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn started(&self) -> bool {
        self.stages.iter().all(|s| s.started())
    }
}
