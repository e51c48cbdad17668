//! Result store: job id to status/result mapping polled by clients.
//!
//! Explicitly constructed and injected into the façade and the worker pool,
//! never a process-wide singleton. Terminal states are immutable: once a job
//! records Succeeded or Failed, later transitions are ignored.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::job::{Job, JobId, JobState, TaskName};

/// Stored outcome record for one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub task: TaskName,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly submitted job. Called by the façade before the job is
    /// handed to the transport, so every issued id resolves to something.
    pub fn insert_pending(&self, job: &Job) {
        let now = Utc::now();
        let record = JobRecord {
            task: job.task,
            state: JobState::Pending,
            enqueued_at: job.enqueued_at,
            updated_at: now,
        };
        self.inner
            .write()
            .expect("result store lock poisoned")
            .insert(job.id, record);
    }

    /// Transition a pending job to running. Returns false if the job is
    /// unknown or already past pending.
    pub fn mark_running(&self, id: JobId) -> bool {
        self.transition(id, |state| match state {
            JobState::Pending => Some(JobState::Running),
            _ => None,
        })
    }

    /// Record a successful terminal outcome.
    pub fn complete(&self, id: JobId, result: Value) -> bool {
        self.transition(id, |state| {
            (!state.is_terminal()).then_some(JobState::Succeeded { result })
        })
    }

    /// Record a failed terminal outcome.
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.transition(id, |state| {
            (!state.is_terminal()).then_some(JobState::Failed { error })
        })
    }

    /// Non-destructive read. Unknown ids are `None`, distinct from pending.
    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.inner
            .read()
            .expect("result store lock poisoned")
            .get(&id)
            .cloned()
    }

    fn transition(&self, id: JobId, next: impl FnOnce(&JobState) -> Option<JobState>) -> bool {
        let mut guard = self.inner.write().expect("result store lock poisoned");
        let Some(record) = guard.get_mut(&id) else {
            return false;
        };
        let Some(state) = next(&record.state) else {
            return false;
        };
        record.state = state;
        record.updated_at = Utc::now();
        true
    }
}
