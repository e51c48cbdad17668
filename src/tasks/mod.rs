//! Task definitions.
//!
//! Each task is a named unit of work taking no caller arguments, reading the
//! market store and performing one side effect (artifact write or mail
//! send). Tasks receive their collaborators through [`TaskContext`]; nothing
//! reaches into ambient process state. A task that returns an error becomes
//! the job's Failed state; tasks are not retried automatically.

pub mod export;
pub mod reminder;
pub mod report;

use std::sync::Arc;

use serde_json::Value;

use crate::artifact::ArtifactStore;
use crate::job::TaskName;
use crate::mailer::MailTransport;
use crate::model::MarketStore;

/// Injected collaborators shared by all tasks.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn MarketStore>,
    pub mailer: Arc<dyn MailTransport>,
    pub artifacts: ArtifactStore,
}

/// Execute one task to completion. The returned JSON value is the job's
/// result payload in the result store.
pub async fn run_task(task: TaskName, ctx: &TaskContext) -> anyhow::Result<Value> {
    match task {
        TaskName::ExportClosedRequests => export::export_closed_requests(ctx).await,
        TaskName::DailyReminder => reminder::daily_reminder(ctx).await,
        TaskName::MonthlyReport => report::monthly_report(ctx).await,
    }
}
