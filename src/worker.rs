//! Worker pool executing claimed jobs.
//!
//! Workers pull from the shared queue consumer, mark the job running,
//! execute the task body to completion (no internal suspension points are
//! awaited besides the task's own IO), and record the terminal outcome.
//! Task failures and panics become the job's Failed state; they never take
//! down the worker.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::job::Job;
use crate::queue::JobConsumer;
use crate::results::ResultStore;
use crate::tasks::{TaskContext, run_task};

pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` worker loops over the shared consumer.
    pub fn start(
        count: usize,
        consumer: JobConsumer,
        results: ResultStore,
        ctx: TaskContext,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = (0..count.max(1))
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    consumer.clone(),
                    results.clone(),
                    ctx.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();
        info!(workers = count.max(1), "worker pool started");
        Self {
            shutdown_tx,
            handles,
        }
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal shutdown and wait for all workers to finish their current job.
    pub async fn shutdown(self) {
        self.trigger_shutdown();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker: usize,
    consumer: JobConsumer,
    results: ResultStore,
    ctx: TaskContext,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(worker, "worker started");
    loop {
        tokio::select! {
            job = consumer.next_job() => {
                match job {
                    Some(job) => execute_job(worker, job, &results, &ctx).await,
                    None => {
                        info!(worker, "job queue closed, worker exiting");
                        break;
                    }
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(worker, "worker shutting down");
                    break;
                }
            }
        }
    }
}

async fn execute_job(worker: usize, job: Job, results: &ResultStore, ctx: &TaskContext) {
    if !results.mark_running(job.id) {
        warn!(worker, job_id = %job.id, "job missing or already settled, skipping");
        return;
    }

    let task = job.task;
    let outcome = AssertUnwindSafe(run_task(task, ctx)).catch_unwind().await;
    match outcome {
        Ok(Ok(result)) => {
            results.complete(job.id, result);
            info!(worker, job_id = %job.id, task = task.as_str(), "job succeeded");
        }
        Ok(Err(err)) => {
            let message = format!("{err:#}");
            results.fail(job.id, &message);
            warn!(worker, job_id = %job.id, task = task.as_str(), error = %message, "job failed");
        }
        Err(panic) => {
            let message = panic_message(panic);
            results.fail(job.id, &message);
            error!(worker, job_id = %job.id, task = task.as_str(), error = %message, "task panicked");
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::job::{JobState, TaskName};
    use crate::mailer::RecordingMailer;
    use crate::model::{
        CustomerRequestRow, ExportRow, MarketStore, ProfessionalSummary, StoreError,
    };
    use crate::queue::job_channel;
    use crate::store::MemoryStore;

    fn test_ctx(store: Arc<MemoryStore>, dir: &tempfile::TempDir) -> TaskContext {
        TaskContext {
            store,
            mailer: Arc::new(RecordingMailer::new()),
            artifacts: crate::artifact::ArtifactStore::new(dir.path()).unwrap(),
        }
    }

    async fn wait_terminal(results: &ResultStore, id: crate::job::JobId) -> JobState {
        for _ in 0..200 {
            if let Some(record) = results.get(id) {
                if record.state.is_terminal() {
                    return record.state;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn worker_runs_job_to_success() {
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let pool = WorkerPool::start(2, consumer, results.clone(), test_ctx(store, &dir));

        let job = Job::new(TaskName::ExportClosedRequests);
        results.insert_pending(&job);
        producer.enqueue(job.clone()).await.unwrap();

        match wait_terminal(&results, job.id).await {
            JobState::Succeeded { result } => {
                assert_eq!(result["rows"], 0);
                assert!(result["artifact"].as_str().is_some());
            }
            other => panic!("expected success, got {other:?}"),
        }
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn failing_store_yields_failed_job_without_killing_worker() {
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_queries(true);
        let pool = WorkerPool::start(1, consumer, results.clone(), test_ctx(store.clone(), &dir));

        let failing = Job::new(TaskName::DailyReminder);
        results.insert_pending(&failing);
        producer.enqueue(failing.clone()).await.unwrap();

        match wait_terminal(&results, failing.id).await {
            JobState::Failed { error } => assert!(error.contains("store unavailable")),
            other => panic!("expected failure, got {other:?}"),
        }

        // The same worker must still process subsequent jobs.
        store.fail_queries(false);
        let next = Job::new(TaskName::DailyReminder);
        results.insert_pending(&next);
        producer.enqueue(next.clone()).await.unwrap();
        assert!(wait_terminal(&results, next.id).await.is_terminal());

        pool.shutdown().await;
    }

    /// Store double whose reminder query panics outright instead of
    /// returning an error.
    struct ExplodingStore;

    #[async_trait]
    impl MarketStore for ExplodingStore {
        async fn closed_request_rows(&self) -> Result<Vec<ExportRow>, StoreError> {
            Ok(Vec::new())
        }

        async fn professional_summaries(&self) -> Result<Vec<ProfessionalSummary>, StoreError> {
            panic!("store exploded")
        }

        async fn customer_request_rows(&self) -> Result<Vec<CustomerRequestRow>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn panicking_task_fails_the_job_and_spares_the_worker() {
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext {
            store: Arc::new(ExplodingStore),
            mailer: Arc::new(RecordingMailer::new()),
            artifacts: crate::artifact::ArtifactStore::new(dir.path()).unwrap(),
        };
        let pool = WorkerPool::start(1, consumer, results.clone(), ctx);

        let panicking = Job::new(TaskName::DailyReminder);
        results.insert_pending(&panicking);
        producer.enqueue(panicking.clone()).await.unwrap();

        match wait_terminal(&results, panicking.id).await {
            JobState::Failed { error } => {
                assert!(error.contains("task panicked"), "error: {error}");
                assert!(error.contains("store exploded"), "error: {error}");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        // The single worker survived the panic and still executes jobs.
        let next = Job::new(TaskName::ExportClosedRequests);
        results.insert_pending(&next);
        producer.enqueue(next.clone()).await.unwrap();
        match wait_terminal(&results, next.id).await {
            JobState::Succeeded { result } => assert_eq!(result["rows"], 0),
            other => panic!("expected success, got {other:?}"),
        }

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_joins_all_workers() {
        let (_producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let dir = tempfile::tempdir().unwrap();
        let pool = WorkerPool::start(
            4,
            consumer,
            results.clone(),
            test_ctx(Arc::new(MemoryStore::new()), &dir),
        );
        pool.shutdown().await;
    }
}
