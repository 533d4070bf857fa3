//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::stage::StageRole;

pub use crate::task::TaskError;

/// Returned by [`crate::executor::Executor::new`] when a list of stages
/// doesn't describe a valid linear pipeline. Rejected before a single
/// queue is allocated or a single stage is started.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("a pipeline needs at least one stage")]
    Empty,
    #[error("the first stage ('{0}') must be a producer")]
    FirstStageNotProducer(String),
    #[error("the last stage ('{0}') must be a consumer")]
    LastStageNotConsumer(String),
    #[error("stage '{0}' has role {1:?}, which is only valid at a pipeline boundary")]
    BoundaryRoleInMiddle(String, StageRole),
    #[error("duplicate stage name '{0}'")]
    DuplicateName(String),
    #[error("'{upstream}' output type does not match '{downstream}' input type")]
    TypeMismatch { upstream: String, downstream: String },
}

/// Returned when a stage or executor is asked to do something its current
/// lifecycle state doesn't allow.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("'{0}' is not ready yet (its queues are not fully attached)")]
    NotReady(String),
    #[error("'{0}' cannot be reconfigured after it has started")]
    AlreadyStarted(String),
    #[error("'{0}' has already stopped and cannot be restarted")]
    AlreadyStopped(String),
}
