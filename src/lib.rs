//! Taskmill - asynchronous job execution and polling for the household
//! services marketplace.
//!
//! Jobs are submitted through a [`facade::JobClient`], carried over an
//! in-process queue to a worker pool, and their outcomes land in a
//! [`results::ResultStore`] that callers poll until the job is ready.
//! Periodic jobs (daily reminders, monthly reports) are fired by the
//! [`scheduler`] against a fixed wall-clock timezone.

pub mod artifact;
pub mod config;
pub mod facade;
pub mod http;
pub mod job;
pub mod mailer;
pub mod model;
pub mod queue;
pub mod results;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod worker;

pub use artifact::ArtifactStore;
pub use config::Config;
pub use facade::{JobClient, PollStatus, SubmitError};
pub use http::HttpServer;
pub use job::{Job, JobId, JobState, TaskName, UnknownTask};
pub use mailer::{MailTransport, SmtpMailer};
pub use model::{MarketStore, ServiceStatus, ServiceType};
pub use queue::{JobConsumer, JobProducer, job_channel};
pub use results::{JobRecord, ResultStore};
pub use scheduler::{SCHEDULER_TZ, Trigger, spawn_scheduler};
pub use store::{MemoryStore, PgMarketStore};
pub use tasks::TaskContext;
pub use worker::WorkerPool;
