//! The unit of work a stage repeatedly invokes.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;

use crate::context::Context;
use crate::msg::Metadata;

/// Opaque task failure. Stages never inspect the cause, only log it and
/// count it; this mirrors how the rest of the crate treats task errors as
/// a black box to isolate.
pub type TaskError = anyhow::Error;

/// The conventional "no payload" type for a producer's input and a
/// consumer's discarded output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Null;

/// The contract every stage drives: take an input, a mutable metadata bag,
/// and the stage's own name (for logging), and produce either an output or
/// an error.
///
/// Implementations must be safe to invoke from many worker loops at once;
/// a single `Arc<dyn Task<I, O>>` is shared across every worker a stage
/// spawns.
#[async_trait]
pub trait Task<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(
        &self,
        ctx: Context,
        input: I,
        meta: &mut Metadata,
        stage_name: &str,
    ) -> Result<O, TaskError>;
}

/// Adapts a plain closure into a [`Task`], for synthetic pipelines in tests
/// and the demo binary where a full `impl Task` is unwarranted ceremony.
pub struct FnTask<F>(pub F);

#[async_trait]
impl<F, I, O> Task<I, O> for FnTask<F>
where
    F: Fn(I, &mut Metadata) -> Result<O, TaskError> + Send + Sync,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, _ctx: Context, input: I, meta: &mut Metadata, _stage_name: &str) -> Result<O, TaskError> {
        (self.0)(input, meta)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

/// Runs a task, translating an unwinding panic into an ordinary `TaskError`
/// so a single misbehaving task can never take down a worker loop.
pub(crate) async fn invoke<I, O>(
    task: &dyn Task<I, O>,
    ctx: Context,
    input: I,
    meta: &mut Metadata,
    stage_name: &str,
) -> Result<O, TaskError>
where
    I: Send + 'static,
    O: Send + 'static,
{
    match AssertUnwindSafe(task.run(ctx, input, meta, stage_name))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("task panicked: {}", panic_message(&*payload))),
    }
}
