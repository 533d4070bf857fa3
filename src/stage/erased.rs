use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LifecycleError;
use crate::queue::AttachedOutput;

use super::state::{StageRole, StageState};

/// The object-safe surface an [`crate::executor::Executor`] drives. Every
/// concrete stage (`Producer`, `Transform`, `FanOut`, `Consumer`)
/// implements this so a pipeline can hold a heterogeneous
/// `Vec<Box<dyn PipelineStage>>` and validate/wire/start/stop it without
/// knowing any stage's payload types at compile time.
#[async_trait]
pub trait PipelineStage: Send {
    fn name(&self) -> &str;
    fn role(&self) -> StageRole;
    fn state(&self) -> StageState;
    fn started(&self) -> bool;

    /// `None` for a producer, which has no input queue.
    fn input_type(&self) -> Option<TypeId>;
    /// `None` for a consumer, which has no output queue.
    fn output_type(&self) -> Option<TypeId>;

    /// Creates this stage's output queue and returns a type-erased reader
    /// for whatever stage comes next, plus a probe for the queue gauge
    /// watcher. Fails if this stage's role has no output.
    fn attach_output(&mut self, queue_name: Arc<str>, capacity: usize) -> Result<AttachedOutput, LifecycleError>;

    /// Accepts the reader half of the upstream stage's output queue.
    /// Fails if this stage's role has no input, or if the boxed reader's
    /// concrete type doesn't match this stage's input type (the executor
    /// should never produce a mismatch here since it validates `TypeId`s
    /// first, but the downcast is checked rather than trusted).
    fn attach_input(&mut self, reader: Box<dyn Any + Send>) -> Result<(), LifecycleError>;

    async fn start(&mut self) -> Result<(), LifecycleError>;

    /// Cancels every in-flight task's context, lets in-flight work finish,
    /// and joins every worker loop. Idempotent.
    async fn stop(&mut self);
}
