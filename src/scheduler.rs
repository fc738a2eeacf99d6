// src/scheduler.rs
use crate::aggregator::{Aggregate, Aggregator};
use crate::task::{Task, TaskOutcome};
use crate::tracker::CompletionTracker;
use crate::types::ReconError;
use futures::FutureExt;
use log::{debug, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

type SharedQueue = Arc<Mutex<mpsc::Receiver<Task>>>;

/// Bounded task queue drained by a fixed pool of workers, feeding a single
/// aggregator.
pub struct Scheduler {
    queue: mpsc::Sender<Task>,
    tracker: CompletionTracker,
    submitted: AtomicUsize,
}

impl Scheduler {
    /// Spawns `concurrency` workers and the aggregator on the current tokio
    /// runtime. Both channels hold at most `concurrency` items.
    pub fn start(concurrency: usize, aggregator: Aggregator) -> Self {
        let workers = concurrency.max(1);
        let (queue_tx, queue_rx) = mpsc::channel::<Task>(workers);
        let (outcome_tx, outcome_rx) = mpsc::channel::<TaskOutcome>(workers);
        let (signal_tx, signal_rx) = mpsc::channel::<()>(workers);
        let (aggregate_tx, aggregate_rx) = oneshot::channel::<Aggregate>();

        info!("Spreading tasks across {} workers", workers);

        let queue: SharedQueue = Arc::new(Mutex::new(queue_rx));
        for id in 0..workers {
            tokio::spawn(worker(id, queue.clone(), outcome_tx.clone(), signal_tx.clone()));
        }
        tokio::spawn(aggregator.run(outcome_rx, aggregate_tx));

        Self {
            queue: queue_tx,
            tracker: CompletionTracker::new(workers, signal_rx, outcome_tx, aggregate_rx),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Waits for room in the queue, so callers producing many tasks are
    /// throttled to the rate workers consume them.
    pub async fn submit(&self, task: Task) -> Result<(), ReconError> {
        self.queue
            .send(task)
            .await
            .map_err(|_| ReconError::QueueClosed)?;
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Closes the queue and blocks until every queued task has run and the
    /// aggregator has drained all outcomes.
    pub async fn finish(self) -> Aggregate {
        let Self { queue, tracker, .. } = self;
        drop(queue);
        let aggregate = tracker.wait().await;
        info!("All tasks completed");
        aggregate
    }
}

async fn worker(
    id: usize,
    queue: SharedQueue,
    outcomes: mpsc::Sender<TaskOutcome>,
    done: mpsc::Sender<()>,
) {
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(task) = next else { break };

        let name = task.name().to_string();
        let outcome = match AssertUnwindSafe(task.run()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                warn!("Task {} panicked on worker {}", name, id);
                TaskOutcome::failed(name.clone(), ReconError::TaskPanicked(name, panic_message(panic)))
            }
        };

        if outcomes.send(outcome).await.is_err() {
            warn!("Worker {}: aggregator is gone, dropping outcome", id);
        }
    }

    drop(outcomes);
    debug!("Worker {} done", id);
    let _ = done.send(()).await;
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
