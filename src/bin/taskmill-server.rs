//! Main entry point for the taskmill server.
//!
//! Wires the store, mailer, queue, worker pool, scheduler, and HTTP boundary
//! together with configuration from environment variables.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskmill::{
    ArtifactStore, Config, HttpServer, JobClient, ResultStore, SmtpMailer, TaskContext, TaskName,
    Trigger, WorkerPool, job_channel, spawn_scheduler, store::PgMarketStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting taskmill server");

    let config = Config::from_env()?;
    info!(?config, "loaded configuration");

    let store = Arc::new(PgMarketStore::connect(&config.database_url).await?);
    info!("connected to database");

    let mailer = Arc::new(SmtpMailer::new(
        &config.smtp_host,
        config.smtp_port,
        &config.sender_email,
    )?);
    let artifacts = ArtifactStore::new(&config.artifact_dir)?;

    let (producer, consumer) = job_channel(config.queue_capacity);
    let results = ResultStore::new();
    let client = JobClient::new(producer, results.clone());

    let ctx = TaskContext {
        store,
        mailer,
        artifacts,
    };
    let pool = WorkerPool::start(config.worker_count, consumer, results, ctx);

    let triggers = vec![
        (
            TaskName::DailyReminder,
            Trigger::daily(config.reminder_hour, config.reminder_minute),
        ),
        (
            TaskName::MonthlyReport,
            Trigger::monthly(config.report_day, config.report_hour, config.report_minute),
        ),
    ];
    let (scheduler_handle, scheduler_shutdown) = spawn_scheduler(
        client.clone(),
        triggers,
        Duration::from_secs(config.scheduler_poll_secs),
    )?;

    let http = HttpServer::start(config.http_addr, client).await?;

    info!("taskmill server started, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    http.shutdown().await;
    let _ = scheduler_shutdown.send(true);
    let _ = scheduler_handle.await;
    pool.shutdown().await;

    Ok(())
}
