//! Daily reminder emails for professionals with pending requests.

use serde_json::{Value, json};
use tracing::{info, warn};

use super::TaskContext;

const SUBJECT: &str = "Daily reminder: you have pending service requests";

/// Email every professional whose REQUESTED or ACCEPTED count is above zero.
/// Professionals with nothing pending are skipped, not failed. A delivery
/// failure for one recipient never aborts the rest; the result payload
/// reports sent/failed/skipped counts.
pub async fn daily_reminder(ctx: &TaskContext) -> anyhow::Result<Value> {
    let professionals = ctx.store.professional_summaries().await?;

    let mut sent = 0u32;
    let mut failed = 0u32;
    let mut skipped = 0u32;
    for professional in &professionals {
        if professional.pending_requests == 0 {
            skipped += 1;
            continue;
        }
        let body = format!(
            "<p>Hello {},</p>\
             <p>You have {} service request(s) waiting for your attention. \
             Please visit your dashboard to accept or close them.</p>",
            professional.name, professional.pending_requests
        );
        match ctx.mailer.send(&professional.email, SUBJECT, &body) {
            Ok(()) => sent += 1,
            Err(err) => {
                warn!(
                    recipient = %professional.email,
                    error = %err,
                    "reminder delivery failed"
                );
                failed += 1;
            }
        }
    }

    info!(sent, failed, skipped, "daily reminder finished");
    Ok(json!({ "sent": sent, "failed": failed, "skipped": skipped }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::context_with;
    use super::*;
    use crate::mailer::RecordingMailer;
    use crate::model::ServiceStatus;
    use crate::store::MemoryStore;

    fn two_professionals() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.add_customer(1, "Asha", "asha@example.com");
        store.add_service(1, "Tap Repair");
        store.add_professional(1, "Ravi", "ravi@example.com");
        store.add_professional(2, "Meena", "meena@example.com");
        // Ravi: 2 REQUESTED + 1 ACCEPTED. Meena: nothing pending.
        store.add_request(1, 1, 1, 1, ServiceStatus::Requested);
        store.add_request(2, 1, 1, 1, ServiceStatus::Requested);
        store.add_request(3, 1, 1, 1, ServiceStatus::Accepted);
        store.add_request(4, 1, 2, 1, ServiceStatus::Closed);
        Arc::new(store)
    }

    #[tokio::test]
    async fn one_email_per_busy_professional_none_for_idle() {
        let mailer = Arc::new(RecordingMailer::new());
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(two_professionals(), mailer.clone(), &dir);

        let result = daily_reminder(&ctx).await.unwrap();
        assert_eq!(result["sent"], 1);
        assert_eq!(result["skipped"], 1);
        assert_eq!(result["failed"], 0);

        let to_ravi = mailer.sent_to("ravi@example.com");
        assert_eq!(to_ravi.len(), 1);
        assert!(to_ravi[0].body.contains('3'), "body: {}", to_ravi[0].body);
        assert!(mailer.sent_to("meena@example.com").is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_isolated_per_recipient() {
        let store = MemoryStore::new();
        store.add_customer(1, "Asha", "asha@example.com");
        store.add_service(1, "Tap Repair");
        store.add_professional(1, "Ravi", "ravi@example.com");
        store.add_professional(2, "Meena", "meena@example.com");
        store.add_request(1, 1, 1, 1, ServiceStatus::Requested);
        store.add_request(2, 1, 2, 1, ServiceStatus::Accepted);

        let mailer = Arc::new(RecordingMailer::new());
        mailer.reject_recipient("ravi@example.com");
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(Arc::new(store), mailer.clone(), &dir);

        let result = daily_reminder(&ctx).await.unwrap();
        assert_eq!(result["sent"], 1);
        assert_eq!(result["failed"], 1);
        assert_eq!(mailer.sent_to("meena@example.com").len(), 1);
    }

    #[tokio::test]
    async fn store_failure_aborts_the_task() {
        let store = two_professionals();
        store.fail_queries(true);
        let dir = tempfile::tempdir().unwrap();
        let ctx = context_with(store, Arc::new(RecordingMailer::new()), &dir);
        assert!(daily_reminder(&ctx).await.is_err());
    }
}
