//! Periodic schedule evaluation.
//!
//! Triggers are fixed wall-clock specs (minute, hour, optional day of month)
//! compiled to 6-field cron expressions and evaluated in a single explicit
//! timezone. The poll loop fires each due entry exactly once per matching
//! tick by recomputing the next occurrence after every firing.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::facade::JobClient;
use crate::job::TaskName;

/// All schedules are evaluated against Indian Standard Time, the
/// marketplace's deployment timezone. Never the host default.
pub const SCHEDULER_TZ: Tz = chrono_tz::Asia::Kolkata;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expr}': {source}")]
    Invalid {
        expr: String,
        source: cron::error::Error,
    },
    #[error("no upcoming occurrence for '{0}'")]
    NoUpcoming(String),
}

/// Fixed-time trigger spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub minute: u32,
    pub hour: u32,
    /// `None` fires every day at hour:minute; `Some(d)` restricts firing to
    /// day `d` of each month.
    pub day_of_month: Option<u32>,
}

impl Trigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Self {
            minute,
            hour,
            day_of_month: None,
        }
    }

    pub fn monthly(day_of_month: u32, hour: u32, minute: u32) -> Self {
        Self {
            minute,
            hour,
            day_of_month: Some(day_of_month),
        }
    }

    /// 6-field form (sec min hour dom month dow) for the `cron` crate.
    fn cron_expr(&self) -> String {
        let dom = self
            .day_of_month
            .map(|d| d.to_string())
            .unwrap_or_else(|| "*".to_string());
        format!("0 {} {} {} * *", self.minute, self.hour, dom)
    }

    /// Next occurrence strictly after `after`, in the scheduler timezone.
    pub fn next_after(&self, after: DateTime<Tz>) -> Result<DateTime<Tz>, ScheduleError> {
        let expr = self.cron_expr();
        let schedule = Schedule::from_str(&expr).map_err(|source| ScheduleError::Invalid {
            expr: expr.clone(),
            source,
        })?;
        schedule
            .after(&after)
            .next()
            .ok_or(ScheduleError::NoUpcoming(expr))
    }
}

struct Entry {
    task: TaskName,
    trigger: Trigger,
    next_run: DateTime<Tz>,
    last_fired: Option<DateTime<Tz>>,
}

pub struct Scheduler {
    client: JobClient,
    entries: Vec<Entry>,
    poll_interval: Duration,
}

impl Scheduler {
    /// Build a scheduler, validating every trigger by computing its first
    /// occurrence up front.
    pub fn new(
        client: JobClient,
        triggers: Vec<(TaskName, Trigger)>,
        poll_interval: Duration,
    ) -> Result<Self, ScheduleError> {
        let now = Utc::now().with_timezone(&SCHEDULER_TZ);
        let entries = triggers
            .into_iter()
            .map(|(task, trigger)| {
                let next_run = trigger.next_after(now)?;
                Ok(Entry {
                    task,
                    trigger,
                    next_run,
                    last_fired: None,
                })
            })
            .collect::<Result<Vec<_>, ScheduleError>>()?;
        Ok(Self {
            client,
            entries,
            poll_interval,
        })
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            entries = self.entries.len(),
            poll_interval_ms = self.poll_interval.as_millis(),
            timezone = %SCHEDULER_TZ,
            "scheduler started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {
                    let now = Utc::now().with_timezone(&SCHEDULER_TZ);
                    self.fire_due(now).await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Fire every entry whose occurrence has passed, then advance it. A
    /// submission failure is logged and the entry still skips to its next
    /// occurrence rather than retrying immediately.
    async fn fire_due(&mut self, now: DateTime<Tz>) -> usize {
        let client = &self.client;
        let mut fired = 0;
        for entry in &mut self.entries {
            if now < entry.next_run {
                continue;
            }
            match client.submit(entry.task).await {
                Ok(job_id) => {
                    info!(
                        task = entry.task.as_str(),
                        %job_id,
                        scheduled_for = %entry.next_run,
                        "fired scheduled job"
                    );
                    fired += 1;
                }
                Err(err) => {
                    error!(
                        task = entry.task.as_str(),
                        error = %err,
                        "failed to submit scheduled job, skipping occurrence"
                    );
                }
            }
            entry.last_fired = Some(now);
            entry.next_run = match entry.trigger.next_after(now) {
                Ok(next) => next,
                Err(err) => {
                    error!(task = entry.task.as_str(), error = %err, "could not advance schedule");
                    now + chrono::Duration::hours(1)
                }
            };
        }
        fired
    }

    #[cfg(test)]
    fn force_due(&mut self, index: usize, at: DateTime<Tz>) {
        self.entries[index].next_run = at;
    }

    #[cfg(test)]
    fn next_run(&self, index: usize) -> DateTime<Tz> {
        self.entries[index].next_run
    }

    #[cfg(test)]
    fn last_fired(&self, index: usize) -> Option<DateTime<Tz>> {
        self.entries[index].last_fired
    }
}

/// Spawn the scheduler loop. Returns the join handle and a shutdown sender.
pub fn spawn_scheduler(
    client: JobClient,
    triggers: Vec<(TaskName, Trigger)>,
    poll_interval: Duration,
) -> Result<(JoinHandle<()>, watch::Sender<bool>), ScheduleError> {
    let scheduler = Scheduler::new(client, triggers, poll_interval)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run(shutdown_rx));
    Ok((handle, shutdown_tx))
}
