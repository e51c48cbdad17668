//! Monthly activity report emailed to every customer.

use anyhow::Context as _;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};
use tracing::{info, warn};

use super::TaskContext;
use crate::model::{CustomerRequestRow, ServiceStatus};

const REPORT_TEMPLATE: &str = include_str!("../../templates/monthly_report.html");

#[derive(Debug, Serialize, PartialEq)]
struct ServiceCount {
    name: String,
    count: i64,
}

#[derive(Debug, Serialize, PartialEq)]
struct CustomerReport {
    name: String,
    email: String,
    total: i64,
    closed: i64,
    services: Vec<ServiceCount>,
}

/// The labeled month is always the calendar month preceding the run date,
/// derived from date arithmetic at execution time.
fn previous_month_bounds(today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first_of_current = today.with_day(1)?;
    let last_of_previous = first_of_current.pred_opt()?;
    let first_of_previous = last_of_previous.with_day(1)?;
    Some((first_of_previous, last_of_previous))
}

/// Group request rows into one report per customer, preserving the store's
/// customer order.
fn aggregate(rows: &[CustomerRequestRow]) -> Vec<CustomerReport> {
    let mut reports: Vec<CustomerReport> = Vec::new();
    for row in rows {
        let index = reports
            .iter()
            .position(|r| r.email == row.customer_email)
            .unwrap_or_else(|| {
                reports.push(CustomerReport {
                    name: row.customer_name.clone(),
                    email: row.customer_email.clone(),
                    total: 0,
                    closed: 0,
                    services: Vec::new(),
                });
                reports.len() - 1
            });
        let report = &mut reports[index];
        report.total += 1;
        if row.status == ServiceStatus::Closed {
            report.closed += 1;
        }
        match report
            .services
            .iter()
            .position(|s| s.name == row.service_name)
        {
            Some(service) => report.services[service].count += 1,
            None => report.services.push(ServiceCount {
                name: row.service_name.clone(),
                count: 1,
            }),
        }
    }
    reports
}

/// Render and email one activity report per customer with any requests.
/// Per-recipient delivery failures are isolated, as in the daily reminder.
pub async fn monthly_report(ctx: &TaskContext) -> anyhow::Result<Value> {
    let today = Utc::now().date_naive();
    let (period_start, period_end) =
        previous_month_bounds(today).context("could not derive previous month")?;
    let month_label = period_start.format("%B %Y").to_string();

    let rows = ctx.store.customer_request_rows().await?;
    let reports = aggregate(&rows);

    let mut tera = Tera::default();
    tera.add_raw_template("monthly_report.html", REPORT_TEMPLATE)
        .context("failed to register report template")?;

    let subject = format!("Your Household Services activity report for {month_label}");
    let mut sent = 0u32;
    let mut failed = 0u32;
    for report in &reports {
        let mut context = TeraContext::new();
        context.insert("month", &month_label);
        context.insert("period_start", &period_start.to_string());
        context.insert("period_end", &period_end.to_string());
        context.insert("name", &report.name);
        context.insert("total", &report.total);
        context.insert("closed", &report.closed);
        context.insert("services", &report.services);
        let body = tera
            .render("monthly_report.html", &context)
            .context("failed to render report template")?;

        match ctx.mailer.send(&report.email, &subject, &body) {
            Ok(()) => sent += 1,
            Err(err) => {
                warn!(
                    recipient = %report.email,
                    error = %err,
                    "report delivery failed"
                );
                failed += 1;
            }
        }
    }

    info!(month = %month_label, sent, failed, "monthly report finished");
    Ok(json!({ "month": month_label, "sent": sent, "failed": failed }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::context_with;
    use super::*;
    use crate::mailer::RecordingMailer;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn previous_month_is_independent_of_day() {
        for day in [1, 15, 31] {
            let (start, end) = previous_month_bounds(date(2026, 3, day)).unwrap();
            assert_eq!(start, date(2026, 2, 1));
            assert_eq!(end, date(2026, 2, 28));
            assert_eq!(start.format("%B %Y").to_string(), "February 2026");
        }
    }

    #[test]
    fn previous_month_crosses_year_boundary() {
        let (start, end) = previous_month_bounds(date(2026, 1, 10)).unwrap();
        assert_eq!(start, date(2025, 12, 1));
        assert_eq!(end, date(2025, 12, 31));
        assert_eq!(start.format("%B %Y").to_string(), "December 2025");
    }

    #[test]
    fn aggregation_counts_totals_closed_and_service_distribution() {
        let rows = vec![
            row("Asha", "asha@example.com", "Tap Repair", ServiceStatus::Closed),
            row("Asha", "asha@example.com", "Tap Repair", ServiceStatus::Requested),
            row("Asha", "asha@example.com", "Wiring Check", ServiceStatus::Closed),
            row("Vikram", "vikram@example.com", "Painting", ServiceStatus::Cancelled),
        ];
        let reports = aggregate(&rows);
        assert_eq!(reports.len(), 2);

        let asha = &reports[0];
        assert_eq!(asha.total, 3);
        assert_eq!(asha.closed, 2);
        assert_eq!(
            asha.services,
            vec![
                ServiceCount {
                    name: "Tap Repair".into(),
                    count: 2
                },
                ServiceCount {
                    name: "Wiring Check".into(),
                    count: 1
                },
            ]
        );

        let vikram = &reports[1];
        assert_eq!(vikram.total, 1);
        assert_eq!(vikram.closed, 0);
    }

    fn row(
        name: &str,
        email: &str,
        service: &str,
        status: ServiceStatus,
    ) -> CustomerRequestRow {
        CustomerRequestRow {
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            service_name: service.to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn emails_one_report_per_customer_with_requests() {
        let store = MemoryStore::new();
        store.add_customer(1, "Asha", "asha@example.com");
        store.add_customer(2, "Vikram", "vikram@example.com");
        store.add_professional(1, "Ravi", "ravi@example.com");
        store.add_service(1, "Tap Repair");
        store.add_request(1, 1, 1, 1, ServiceStatus::Closed);
        store.add_request(2, 1, 1, 1, ServiceStatus::Requested);
        // Vikram has no requests and gets no report.

        let mailer = Arc::new(RecordingMailer::new());
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(Arc::new(store), mailer.clone(), &dir);

        let result = monthly_report(&ctx).await.unwrap();
        assert_eq!(result["sent"], 1);
        assert_eq!(result["failed"], 0);

        let sent = mailer.sent_to("asha@example.com");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Tap Repair"));
        assert!(sent[0].body.contains("Hello Asha"));
        assert!(sent[0].subject.contains("activity report"));
        assert!(mailer.sent_to("vikram@example.com").is_empty());
    }

    #[tokio::test]
    async fn report_delivery_failure_is_isolated() {
        let store = MemoryStore::new();
        store.add_customer(1, "Asha", "asha@example.com");
        store.add_customer(2, "Vikram", "vikram@example.com");
        store.add_professional(1, "Ravi", "ravi@example.com");
        store.add_service(1, "Tap Repair");
        store.add_request(1, 1, 1, 1, ServiceStatus::Closed);
        store.add_request(2, 2, 1, 1, ServiceStatus::Closed);

        let mailer = Arc::new(RecordingMailer::new());
        mailer.reject_recipient("asha@example.com");
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(Arc::new(store), mailer.clone(), &dir);

        let result = monthly_report(&ctx).await.unwrap();
        assert_eq!(result["sent"], 1);
        assert_eq!(result["failed"], 1);
        assert_eq!(mailer.sent_to("vikram@example.com").len(), 1);
    }
}
