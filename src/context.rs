//! The cancellation context handed to every task invocation.

use tokio_util::sync::CancellationToken;

/// A task-scoped handle for cooperative cancellation.
///
/// Every `Context` is a child of the stage's stop signal: stopping a stage
/// cancels every `Context` currently in flight, but a worker loop still
/// awaits the in-progress task to return before it observes `stopped`
/// itself, so a well-behaved task has a chance to notice cancellation and
/// unwind cleanly instead of being aborted mid-flight.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
}

impl Context {
    pub(crate) fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    /// A standalone context with no parent, useful for tests.
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
