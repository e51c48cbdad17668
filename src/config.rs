//! Configuration loading from environment variables.
//!
//! Uses the following environment variables:
//! - `TASKMILL_DATABASE_URL`: PostgreSQL connection string (required)
//! - `TASKMILL_HTTP_ADDR`: submission/polling server bind address (default: 0.0.0.0:8700)
//! - `TASKMILL_WORKER_COUNT`: number of job workers (default: num_cpus)
//! - `TASKMILL_QUEUE_CAPACITY`: job queue capacity (default: 256)
//! - `TASKMILL_ARTIFACT_DIR`: directory for export artifacts (default: ./artifacts)
//! - `TASKMILL_SMTP_HOST`: SMTP relay host (default: localhost)
//! - `TASKMILL_SMTP_PORT`: SMTP relay port (default: 1025)
//! - `TASKMILL_SENDER_EMAIL`: From address for outgoing mail (default: jobs@householdservices.example)
//! - `TASKMILL_REMINDER_HOUR` / `TASKMILL_REMINDER_MINUTE`: daily reminder trigger, IST (default: 18:00)
//! - `TASKMILL_REPORT_DAY` / `TASKMILL_REPORT_HOUR` / `TASKMILL_REPORT_MINUTE`:
//!   monthly report trigger, IST (default: day 1 at 02:00)
//! - `TASKMILL_SCHEDULER_POLL_SECS`: schedule check interval (default: 30)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Default bind address for the submission/polling server.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8700";

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL for the marketplace schema.
    pub database_url: String,

    /// Submission/polling HTTP bind address.
    pub http_addr: SocketAddr,

    /// Number of job worker loops.
    pub worker_count: usize,

    /// Bounded queue capacity.
    pub queue_capacity: usize,

    /// Root directory for export artifacts.
    pub artifact_dir: PathBuf,

    /// SMTP relay.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender_email: String,

    /// Daily reminder trigger (IST).
    pub reminder_hour: u32,
    pub reminder_minute: u32,

    /// Monthly report trigger (IST).
    pub report_day: u32,
    pub report_hour: u32,
    pub report_minute: u32,

    /// Schedule check interval in seconds.
    pub scheduler_poll_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` file if present, then reads from environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("TASKMILL_DATABASE_URL")
            .context("TASKMILL_DATABASE_URL environment variable is required")?;

        let http_addr =
            env::var("TASKMILL_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
        let http_addr =
            SocketAddr::from_str(&http_addr).context("invalid TASKMILL_HTTP_ADDR format")?;

        let worker_count = env::var("TASKMILL_WORKER_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(num_cpus::get);

        let queue_capacity = env::var("TASKMILL_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256);

        let artifact_dir = env::var("TASKMILL_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./artifacts"));

        let smtp_host = env::var("TASKMILL_SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());

        let smtp_port = env::var("TASKMILL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1025);

        let sender_email = env::var("TASKMILL_SENDER_EMAIL")
            .unwrap_or_else(|_| "jobs@householdservices.example".to_string());

        let reminder_hour = bounded(
            "TASKMILL_REMINDER_HOUR",
            env::var("TASKMILL_REMINDER_HOUR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(18),
            0,
            23,
        )?;

        let reminder_minute = bounded(
            "TASKMILL_REMINDER_MINUTE",
            env::var("TASKMILL_REMINDER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            0,
            59,
        )?;

        let report_day = bounded(
            "TASKMILL_REPORT_DAY",
            env::var("TASKMILL_REPORT_DAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            1,
            31,
        )?;

        let report_hour = bounded(
            "TASKMILL_REPORT_HOUR",
            env::var("TASKMILL_REPORT_HOUR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            0,
            23,
        )?;

        let report_minute = bounded(
            "TASKMILL_REPORT_MINUTE",
            env::var("TASKMILL_REPORT_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            0,
            59,
        )?;

        let scheduler_poll_secs = env::var("TASKMILL_SCHEDULER_POLL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database_url,
            http_addr,
            worker_count,
            queue_capacity,
            artifact_dir,
            smtp_host,
            smtp_port,
            sender_email,
            reminder_hour,
            reminder_minute,
            report_day,
            report_hour,
            report_minute,
            scheduler_poll_secs,
        })
    }

    /// Create a test configuration with defaults.
    #[cfg(test)]
    pub fn test_config(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            http_addr: "127.0.0.1:0".parse().unwrap(),
            worker_count: 2,
            queue_capacity: 16,
            artifact_dir: PathBuf::from("./artifacts"),
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            sender_email: "jobs@householdservices.example".to_string(),
            reminder_hour: 18,
            reminder_minute: 0,
            report_day: 1,
            report_hour: 2,
            report_minute: 0,
            scheduler_poll_secs: 30,
        }
    }
}

/// Range-check a trigger field at load time so a bad value names its
/// variable instead of surfacing later as a cron parse error.
fn bounded(name: &str, value: u32, min: u32, max: u32) -> Result<u32> {
    anyhow::ensure!(
        (min..=max).contains(&value),
        "{name} must be in {min}..={max}, got {value}"
    );
    Ok(value)
}
