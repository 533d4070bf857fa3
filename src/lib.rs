//! Flowline: a typed, concurrent stage-pipeline runtime.
//!
//! A pipeline is a linear sequence of [`stage::PipelineStage`]s wired
//! together by bounded queues and driven by an [`Executor`]. Four stage
//! shapes cover every role a pipeline needs: [`stage::Producer`] originates
//! messages on a timer, [`stage::Transform`] maps one message to one,
//! [`stage::FanOut`] splits one message into many, and [`stage::Consumer`]
//! terminates a branch. Each stage runs its own pool of persistent worker
//! loops; within a single worker, messages are processed strictly in
//! order.

pub mod context;
pub mod error;
pub mod executor;
pub mod metric;
pub mod msg;
pub mod queue;
pub mod stage;
pub mod task;
pub mod watcher;

pub use context::Context;
pub use error::{LifecycleError, TopologyError};
pub use executor::{Executor, StageSpec};
pub use metric::{InMemoryMetric, Metric, NullMetric, PrometheusMetric};
pub use msg::{Metadata, Msg};
pub use queue::{QueueProbe, QueueReader, QueueWriter};
pub use stage::{Consumer, FanOut, PipelineStage, Producer, Stage, StageRole, StageState, Transform};
pub use task::{FnTask, Null, Task, TaskError};
pub use watcher::QueueGaugeWatcher;
