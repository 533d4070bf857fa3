//! Bounded inter-stage queues.
//!
//! Built on `flume` rather than `tokio::sync::mpsc` because a stage's worker
//! pool is several independent, persistent loops draining the *same* input
//! queue concurrently — `flume::Receiver` is natively `Clone`, so each
//! worker can hold its own handle onto one shared bounded channel.

use std::any::Any;
use std::sync::Arc;

use crate::msg::Msg;

/// Returned when a queue's peer has gone away (the stage that owned the
/// other end has stopped or panicked).
#[derive(Debug, Clone, Copy)]
pub struct QueueClosed;

impl std::fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue closed")
    }
}

impl std::error::Error for QueueClosed {}

pub struct QueueWriter<T> {
    name: Arc<str>,
    tx: flume::Sender<Msg<T>>,
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> QueueWriter<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&self, msg: Msg<T>) -> Result<(), QueueClosed> {
        self.tx.send_async(msg).await.map_err(|_| QueueClosed)
    }

    pub fn probe(&self) -> Arc<dyn QueueProbe> {
        Arc::new(SenderProbe {
            name: self.name.clone(),
            tx: self.tx.clone(),
        })
    }
}

pub struct QueueReader<T> {
    name: Arc<str>,
    rx: flume::Receiver<Msg<T>>,
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T: Send + 'static> QueueReader<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` once every writer for this queue has dropped and the queue
    /// has drained, signaling this worker loop to exit.
    pub async fn recv(&self) -> Option<Msg<T>> {
        self.rx.recv_async().await.ok()
    }

    pub fn depth(&self) -> usize {
        self.rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }
}

/// Creates one bounded queue, rounding a requested capacity of zero up to
/// one so a queue is never accidentally unusable.
pub fn bounded<T: Send + 'static>(name: impl Into<Arc<str>>, capacity: usize) -> (QueueWriter<T>, QueueReader<T>) {
    let name: Arc<str> = name.into();
    let (tx, rx) = flume::bounded(capacity.max(1));
    (
        QueueWriter {
            name: name.clone(),
            tx,
        },
        QueueReader { name, rx },
    )
}

/// Type-erased read access to a queue's depth and capacity, so an
/// [`crate::executor::Executor`] can sample every queue in a pipeline
/// without knowing any of their payload types.
pub trait QueueProbe: Send + Sync {
    fn name(&self) -> &str;
    fn depth(&self) -> usize;
    fn capacity(&self) -> usize;
}

struct SenderProbe<T> {
    name: Arc<str>,
    tx: flume::Sender<Msg<T>>,
}

impl<T: Send + 'static> QueueProbe for SenderProbe<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn depth(&self) -> usize {
        self.tx.len()
    }

    fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// The downstream-facing half of a freshly attached queue: a type-erased
/// reader the executor hands to the next stage, plus a probe it keeps for
/// the queue gauge watcher.
pub struct AttachedOutput {
    pub reader: Box<dyn Any + Send>,
    pub probe: Arc<dyn QueueProbe>,
}
