//! Read model over the marketplace schema.
//!
//! The job subsystem only ever reads the relational store; all writes to
//! service requests happen in the HTTP application that owns the schema.
//! Tasks receive a [`MarketStore`] handle by injection rather than reaching
//! into any ambient application context.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a service request. Serialized by symbolic name everywhere,
/// matching what the marketplace stores in the `service_status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Requested,
    Accepted,
    Completed,
    Closed,
    Cancelled,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Accepted => "ACCEPTED",
            Self::Completed => "COMPLETED",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Statuses that still need attention from a professional.
    pub fn is_pending_for_professional(&self) -> bool {
        matches!(self, Self::Requested | Self::Accepted)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(Self::Requested),
            "ACCEPTED" => Ok(Self::Accepted),
            "COMPLETED" => Ok(Self::Completed),
            "CLOSED" => Ok(Self::Closed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Category of service offered on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Plumbing,
    Electrical,
    Cleaning,
    Carpentry,
    Painting,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "PLUMBING",
            Self::Electrical => "ELECTRICAL",
            Self::Cleaning => "CLEANING",
            Self::Carpentry => "CARPENTRY",
            Self::Painting => "PAINTING",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joined view of one CLOSED service request, as exported to CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub request_id: i32,
    pub customer_name: String,
    pub professional_name: String,
    pub service_name: String,
    pub status: ServiceStatus,
}

/// Per-professional workload snapshot used by the daily reminder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessionalSummary {
    pub name: String,
    pub email: String,
    /// Count of requests in REQUESTED or ACCEPTED assigned to them.
    pub pending_requests: i64,
}

/// One service request seen from the customer side; the monthly report
/// groups these per customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRequestRow {
    pub customer_name: String,
    pub customer_email: String,
    pub service_name: String,
    pub status: ServiceStatus,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unknown service status: {0}")]
    UnknownStatus(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only query surface the tasks run against.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// All CLOSED requests joined with customer, professional, and service.
    async fn closed_request_rows(&self) -> Result<Vec<ExportRow>, StoreError>;

    /// Every professional with their contact email and pending request count
    /// (zero counts included; the reminder task decides who to skip).
    async fn professional_summaries(&self) -> Result<Vec<ProfessionalSummary>, StoreError>;

    /// Every request joined with its customer and service, ordered by
    /// customer so report aggregation can group adjacent rows.
    async fn customer_request_rows(&self) -> Result<Vec<CustomerRequestRow>, StoreError>;
}
