//! Submission/polling façade used by the HTTP layer and the scheduler.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::job::{Job, JobId, JobState, TaskName, UnknownTask};
use crate::queue::JobProducer;
use crate::results::ResultStore;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    UnknownTask(#[from] UnknownTask),
    #[error("job queue is closed")]
    QueueClosed,
}

/// Current state of a polled job. The three finished/unfinished outcomes are
/// never ambiguous, and never-issued ids get their own answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollStatus {
    NotFound,
    /// Pending or currently running; the caller should retry later.
    Pending,
    Failed {
        error: String,
    },
    Ready {
        task: TaskName,
        result: Value,
    },
}

/// Client handle over the queue producer and the result store. Cheap to
/// clone; one instance is shared by the HTTP layer and the scheduler.
#[derive(Clone)]
pub struct JobClient {
    producer: JobProducer,
    results: ResultStore,
}

impl JobClient {
    pub fn new(producer: JobProducer, results: ResultStore) -> Self {
        Self { producer, results }
    }

    /// Enqueue a job and return its id without waiting for execution. The
    /// pending record is written before the enqueue so the id always
    /// resolves; if the transport rejects the job the record is failed.
    pub async fn submit(&self, task: TaskName) -> Result<JobId, SubmitError> {
        let job = Job::new(task);
        self.results.insert_pending(&job);
        if self.producer.enqueue(job.clone()).await.is_err() {
            self.results.fail(job.id, "job queue is closed");
            return Err(SubmitError::QueueClosed);
        }
        debug!(job_id = %job.id, task = task.as_str(), "job submitted");
        Ok(job.id)
    }

    /// Submit by task name, rejecting unknown names before anything is
    /// enqueued.
    pub async fn submit_named(&self, name: &str) -> Result<JobId, SubmitError> {
        let task: TaskName = name.parse()?;
        self.submit(task).await
    }

    /// Non-destructive poll. No timeout is enforced here; callers decide
    /// when to give up.
    pub fn poll(&self, id: JobId) -> PollStatus {
        match self.results.get(id) {
            None => PollStatus::NotFound,
            Some(record) => match record.state {
                JobState::Pending | JobState::Running => PollStatus::Pending,
                JobState::Failed { error } => PollStatus::Failed { error },
                JobState::Succeeded { result } => PollStatus::Ready {
                    task: record.task,
                    result,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::artifact::ArtifactStore;
    use crate::mailer::RecordingMailer;
    use crate::model::ServiceStatus;
    use crate::queue::job_channel;
    use crate::store::MemoryStore;
    use crate::tasks::TaskContext;
    use crate::worker::WorkerPool;

    #[tokio::test]
    async fn submit_returns_immediately_with_resolvable_id() {
        let (producer, _consumer) = job_channel(8);
        let results = ResultStore::new();
        let client = JobClient::new(producer, results);

        let id = client.submit(TaskName::DailyReminder).await.unwrap();
        // No worker is running, so the job stays pending but never vanishes.
        assert_eq!(client.poll(id), PollStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_task_is_rejected_synchronously() {
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let client = JobClient::new(producer, results);

        let err = client.submit_named("vacuum_the_moon").await.unwrap_err();
        assert!(matches!(err, SubmitError::UnknownTask(_)));

        // Nothing reached the queue.
        drop(client);
        assert!(consumer.next_job().await.is_none());
    }

    #[tokio::test]
    async fn polling_a_never_issued_id_is_not_found() {
        let (producer, _consumer) = job_channel(8);
        let client = JobClient::new(producer, ResultStore::new());
        assert_eq!(client.poll(JobId::new()), PollStatus::NotFound);
    }

    #[tokio::test]
    async fn closed_queue_fails_the_submission_and_the_record() {
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let client = JobClient::new(producer, results.clone());
        drop(consumer);

        let err = client.submit(TaskName::MonthlyReport).await.unwrap_err();
        assert!(matches!(err, SubmitError::QueueClosed));
    }

    #[tokio::test]
    async fn submit_then_poll_until_export_is_ready() {
        let store = MemoryStore::new();
        store.add_customer(1, "Asha", "asha@example.com");
        store.add_professional(1, "Ravi", "ravi@example.com");
        store.add_service(1, "Tap Repair");
        for id in 1..=3 {
            store.add_request(id, 1, 1, 1, ServiceStatus::Closed);
        }
        for id in 4..=10 {
            store.add_request(id, 1, 1, 1, ServiceStatus::Requested);
        }

        let dir = tempfile::tempdir().unwrap();
        let ctx = TaskContext {
            store: Arc::new(store),
            mailer: Arc::new(RecordingMailer::new()),
            artifacts: ArtifactStore::new(dir.path()).unwrap(),
        };
        let (producer, consumer) = job_channel(8);
        let results = ResultStore::new();
        let pool = WorkerPool::start(2, consumer, results.clone(), ctx);
        let client = JobClient::new(producer, results);

        let id = client.submit(TaskName::ExportClosedRequests).await.unwrap();

        let mut status = client.poll(id);
        for _ in 0..200 {
            if !matches!(status, PollStatus::Pending) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = client.poll(id);
        }

        let PollStatus::Ready { task, result } = status else {
            panic!("expected ready, got {status:?}");
        };
        assert_eq!(task, TaskName::ExportClosedRequests);
        let content =
            std::fs::read_to_string(result["artifact"].as_str().unwrap()).unwrap();
        // 1 header row plus exactly the 3 CLOSED requests.
        assert_eq!(content.lines().count(), 4);

        pool.shutdown().await;
    }
}
