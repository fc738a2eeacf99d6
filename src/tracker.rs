// src/tracker.rs
use crate::aggregator::Aggregate;
use crate::task::TaskOutcome;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

/// Shutdown barrier for one run: every worker reports done, then the
/// outcome channel is closed, then the aggregator hands over its results.
pub struct CompletionTracker {
    workers: usize,
    signals: mpsc::Receiver<()>,
    outcomes: Option<mpsc::Sender<TaskOutcome>>,
    aggregate: oneshot::Receiver<Aggregate>,
}

impl CompletionTracker {
    /// `outcomes` is the tracker's own handle on the aggregator's inbound
    /// channel. Workers hold clones; the channel closes once all are dropped.
    pub fn new(
        workers: usize,
        signals: mpsc::Receiver<()>,
        outcomes: mpsc::Sender<TaskOutcome>,
        aggregate: oneshot::Receiver<Aggregate>,
    ) -> Self {
        Self {
            workers,
            signals,
            outcomes: Some(outcomes),
            aggregate,
        }
    }

    /// Must only be called after the task queue has been closed.
    pub async fn wait(mut self) -> Aggregate {
        for done in 0..self.workers {
            if self.signals.recv().await.is_none() {
                error!("Lost track of {} workers", self.workers - done);
                break;
            }
        }
        debug!("All {} workers finished", self.workers);

        drop(self.outcomes.take());

        match self.aggregate.await {
            Ok(aggregate) => aggregate,
            Err(_) => {
                error!("Aggregator stopped without handing over results");
                Aggregate::default()
            }
        }
    }
}
