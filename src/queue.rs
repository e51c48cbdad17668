//! In-process job queue transport.
//!
//! A bounded mpsc channel split into a cloneable producer half (held by the
//! façade and the scheduler) and a consumer half shared by all workers. No
//! FIFO guarantee exists across workers: delivery order into the channel is
//! preserved, but independently claimed jobs complete in any order.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use crate::job::Job;

/// Create a connected producer/consumer pair with the given capacity.
pub fn job_channel(capacity: usize) -> (JobProducer, JobConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        JobProducer { tx },
        JobConsumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("job queue is closed")]
pub struct QueueClosed;

/// Submission half of the queue.
#[derive(Clone)]
pub struct JobProducer {
    tx: mpsc::Sender<Job>,
}

impl JobProducer {
    pub async fn enqueue(&self, job: Job) -> Result<(), QueueClosed> {
        self.tx.send(job).await.map_err(|_| QueueClosed)
    }
}

/// Consumption half of the queue. Cloneable so every worker in the pool can
/// pull from the same channel; the receiver lives behind an async mutex.
#[derive(Clone)]
pub struct JobConsumer {
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl JobConsumer {
    /// Await the next job. Returns `None` once all producers are dropped and
    /// the channel has drained.
    pub async fn next_job(&self) -> Option<Job> {
        self.rx.lock().await.recv().await
    }
}
