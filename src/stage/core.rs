use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metric::Metric;
use crate::queue::{QueueReader, QueueWriter};

use super::state::StateCell;

/// Fields shared by every concrete stage shape: queue handles, the worker
/// handles it spawned, and the state machine gating attach/start/stop.
pub(crate) struct StageCore<I, O> {
    pub name: Arc<str>,
    pub worker_count: usize,
    pub metric: Arc<dyn Metric>,
    pub state: StateCell,
    pub stop_token: CancellationToken,
    pub input: Option<QueueReader<I>>,
    pub output: Option<QueueWriter<O>>,
    pub handles: Vec<JoinHandle<()>>,
}

impl<I, O> StageCore<I, O> {
    pub fn new(name: impl Into<Arc<str>>, worker_count: usize, metric: Arc<dyn Metric>) -> Self {
        let name = name.into();
        Self {
            state: StateCell::new(name.to_string()),
            name,
            worker_count: worker_count.max(1),
            metric,
            stop_token: CancellationToken::new(),
            input: None,
            output: None,
            handles: Vec::new(),
        }
    }

    pub async fn join_handles(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}
