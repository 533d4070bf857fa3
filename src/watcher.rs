//! Periodic sampling of every inter-stage queue's depth.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::metric::Metric;
use crate::queue::QueueProbe;

/// Runs a background tick that reports every queue's depth through a
/// [`Metric`], independent of whatever traffic is actually flowing. Useful
/// for a pipeline whose throughput is too low for per-message `enqueued`
/// calls to give a timely backpressure signal.
pub struct QueueGaugeWatcher {
    queues: HashMap<String, Arc<dyn QueueProbe>>,
    tick_interval: Duration,
    metric: Arc<dyn Metric>,
    stop_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl QueueGaugeWatcher {
    pub fn new(queues: HashMap<String, Arc<dyn QueueProbe>>, tick_interval: Duration, metric: Arc<dyn Metric>) -> Self {
        Self {
            queues,
            tick_interval,
            metric,
            stop_token: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let queues = self.queues.clone();
        let metric = self.metric.clone();
        let tick_interval = self.tick_interval;
        let stop_token = self.stop_token.clone();
        let span = tracing::info_span!("queue_gauge_watcher");
        self.handle = Some(tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(tick_interval);
                loop {
                    tokio::select! {
                        biased;
                        _ = stop_token.cancelled() => break,
                        _ = ticker.tick() => {
                            for (queue_name, probe) in &queues {
                                metric.enqueued(queue_name, probe.depth());
                            }
                        }
                    }
                }
            }
            .instrument(span),
        ));
    }

    pub async fn stop(&mut self) {
        self.stop_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::metric::InMemoryMetric;
    use crate::queue;

    use super::*;

    #[tokio::test]
    async fn samples_queue_depth_on_a_tick() {
        let (tx, _rx) = queue::bounded::<i32>("a->b", 8);
        let mut queues: HashMap<String, Arc<dyn QueueProbe>> = HashMap::new();
        queues.insert("a->b".to_string(), tx.probe());

        let metric = Arc::new(InMemoryMetric::new());
        let mut watcher = QueueGaugeWatcher::new(queues, Duration::from_millis(5), metric.clone());
        watcher.start();

        tx.send(crate::msg::Msg::with_empty_metadata(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        watcher.stop().await;

        assert_eq!(metric.last_enqueued_depth("a->b"), Some(1));
    }
}
