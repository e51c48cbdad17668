//! Job model shared by the queue, result store, and façade.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for an enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The registered background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
    ExportClosedRequests,
    DailyReminder,
    MonthlyReport,
}

impl TaskName {
    pub const ALL: [TaskName; 3] = [
        TaskName::ExportClosedRequests,
        TaskName::DailyReminder,
        TaskName::MonthlyReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExportClosedRequests => "export_closed_requests",
            Self::DailyReminder => "daily_reminder",
            Self::MonthlyReport => "monthly_report",
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection for task names outside the registry. Raised synchronously at
/// submission time so malformed requests never reach a worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task: {0}")]
pub struct UnknownTask(pub String);

impl FromStr for TaskName {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "export_closed_requests" => Ok(Self::ExportClosedRequests),
            "daily_reminder" => Ok(Self::DailyReminder),
            "monthly_report" => Ok(Self::MonthlyReport),
            other => Err(UnknownTask(other.to_string())),
        }
    }
}

/// One enqueued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub task: TaskName,
    /// Caller-supplied arguments. The current tasks take none, so this is
    /// always `null`, but the wire shape carries it for forward compatibility.
    pub args: Value,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    pub fn new(task: TaskName) -> Self {
        Self {
            id: JobId::new(),
            task,
            args: Value::Null,
            enqueued_at: Utc::now(),
        }
    }
}

/// Lifecycle of a job. Terminal states are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded { result: Value },
    Failed { error: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_name_round_trips_through_str() {
        for task in TaskName::ALL {
            assert_eq!(task.as_str().parse::<TaskName>().unwrap(), task);
        }
    }

    #[test]
    fn unknown_task_is_rejected() {
        let err = "drop_all_tables".parse::<TaskName>().unwrap_err();
        assert_eq!(err, UnknownTask("drop_all_tables".to_string()));
    }

    #[test]
    fn task_name_serializes_symbolically() {
        let json = serde_json::to_string(&TaskName::MonthlyReport).unwrap();
        assert_eq!(json, "\"monthly_report\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(
            JobState::Succeeded {
                result: Value::Null
            }
            .is_terminal()
        );
        assert!(
            JobState::Failed {
                error: "boom".into()
            }
            .is_terminal()
        );
    }
}
