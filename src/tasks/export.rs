//! CSV export of closed service requests.

use serde_json::{Value, json};
use tracing::info;

use super::TaskContext;

pub const CSV_HEADER: [&str; 5] = [
    "ID",
    "Customer Name",
    "Professional Name",
    "Service Name",
    "Status",
];

/// Join CLOSED requests with their customer, professional, and service, and
/// write them as a CSV artifact. An empty result set still produces a valid
/// header-only file. The result payload carries the artifact path.
pub async fn export_closed_requests(ctx: &TaskContext) -> anyhow::Result<Value> {
    let rows = ctx.store.closed_request_rows().await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in &rows {
        writer.write_record([
            row.request_id.to_string(),
            row.customer_name.clone(),
            row.professional_name.clone(),
            row.service_name.clone(),
            row.status.as_str().to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv buffer: {err}"))?;

    let path = ctx.artifacts.write_export(&bytes)?;
    info!(rows = rows.len(), path = %path.display(), "closed requests exported");

    Ok(json!({
        "artifact": path.to_string_lossy(),
        "rows": rows.len(),
    }))
}
