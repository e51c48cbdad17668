//! Market store implementations.
//!
//! [`PgMarketStore`] issues read-only joins against the marketplace schema
//! (`service_request`, `customer`, `service_professional`, `service`, plus
//! `user` for contact emails). [`MemoryStore`] is a small relational fixture
//! mirroring the same views for tests and local runs without a database.

use std::str::FromStr;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::model::{
    CustomerRequestRow, ExportRow, MarketStore, ProfessionalSummary, ServiceStatus, StoreError,
};

// ============================================================================
// Postgres
// ============================================================================

pub struct PgMarketStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ExportRecord {
    id: i32,
    customer_name: String,
    professional_name: String,
    service_name: String,
    status: String,
}

#[derive(FromRow)]
struct ProfessionalRecord {
    name: String,
    email: String,
    pending_requests: i64,
}

#[derive(FromRow)]
struct CustomerRequestRecord {
    customer_name: String,
    customer_email: String,
    service_name: String,
    status: String,
}

impl PgMarketStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    async fn closed_request_rows(&self) -> Result<Vec<ExportRow>, StoreError> {
        let records = sqlx::query_as::<_, ExportRecord>(
            r#"
            SELECT sr.id,
                   c.name AS customer_name,
                   p.name AS professional_name,
                   s.name AS service_name,
                   sr.service_status AS status
            FROM service_request sr
            JOIN customer c ON sr.customer_id = c.id
            JOIN service_professional p ON sr.professional_id = p.id
            JOIN service s ON sr.service_id = s.id
            WHERE sr.service_status = 'CLOSED'
            ORDER BY sr.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| {
                Ok(ExportRow {
                    request_id: record.id,
                    customer_name: record.customer_name,
                    professional_name: record.professional_name,
                    service_name: record.service_name,
                    status: ServiceStatus::from_str(&record.status)?,
                })
            })
            .collect()
    }

    async fn professional_summaries(&self) -> Result<Vec<ProfessionalSummary>, StoreError> {
        let records = sqlx::query_as::<_, ProfessionalRecord>(
            r#"
            SELECT p.name,
                   u.email,
                   COUNT(sr.id) AS pending_requests
            FROM service_professional p
            JOIN "user" u ON p.user_id = u.id
            LEFT JOIN service_request sr
                ON sr.professional_id = p.id
               AND sr.service_status IN ('REQUESTED', 'ACCEPTED')
            GROUP BY p.id, p.name, u.email
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(|record| ProfessionalSummary {
                name: record.name,
                email: record.email,
                pending_requests: record.pending_requests,
            })
            .collect())
    }

    async fn customer_request_rows(&self) -> Result<Vec<CustomerRequestRow>, StoreError> {
        let records = sqlx::query_as::<_, CustomerRequestRecord>(
            r#"
            SELECT c.name AS customer_name,
                   u.email AS customer_email,
                   s.name AS service_name,
                   sr.service_status AS status
            FROM service_request sr
            JOIN customer c ON sr.customer_id = c.id
            JOIN "user" u ON c.user_id = u.id
            JOIN service s ON sr.service_id = s.id
            ORDER BY c.id, sr.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| {
                Ok(CustomerRequestRow {
                    customer_name: record.customer_name,
                    customer_email: record.customer_email,
                    service_name: record.service_name,
                    status: ServiceStatus::from_str(&record.status)?,
                })
            })
            .collect()
    }
}

// ============================================================================
// In-memory fixture store
// ============================================================================

#[derive(Debug, Clone)]
struct CustomerFixture {
    id: i32,
    name: String,
    email: String,
}

#[derive(Debug, Clone)]
struct ProfessionalFixture {
    id: i32,
    name: String,
    email: String,
}

#[derive(Debug, Clone)]
struct ServiceFixture {
    id: i32,
    name: String,
}

#[derive(Debug, Clone)]
struct RequestFixture {
    id: i32,
    customer_id: i32,
    professional_id: i32,
    service_id: i32,
    status: ServiceStatus,
}

/// In-memory mirror of the marketplace views, populated by tests.
#[derive(Default)]
pub struct MemoryStore {
    customers: RwLock<Vec<CustomerFixture>>,
    professionals: RwLock<Vec<ProfessionalFixture>>,
    services: RwLock<Vec<ServiceFixture>>,
    requests: RwLock<Vec<RequestFixture>>,
    fail_queries: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, id: i32, name: &str, email: &str) {
        self.customers
            .write()
            .expect("store lock poisoned")
            .push(CustomerFixture {
                id,
                name: name.to_string(),
                email: email.to_string(),
            });
    }

    pub fn add_professional(&self, id: i32, name: &str, email: &str) {
        self.professionals
            .write()
            .expect("store lock poisoned")
            .push(ProfessionalFixture {
                id,
                name: name.to_string(),
                email: email.to_string(),
            });
    }

    pub fn add_service(&self, id: i32, name: &str) {
        self.services
            .write()
            .expect("store lock poisoned")
            .push(ServiceFixture {
                id,
                name: name.to_string(),
            });
    }

    pub fn add_request(
        &self,
        id: i32,
        customer_id: i32,
        professional_id: i32,
        service_id: i32,
        status: ServiceStatus,
    ) {
        self.requests
            .write()
            .expect("store lock poisoned")
            .push(RequestFixture {
                id,
                customer_id,
                professional_id,
                service_id,
                status,
            });
    }

    /// Make every query fail, to exercise the job-failure path.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "connection refused (injected)".to_string(),
            ));
        }
        Ok(())
    }

    fn customer(&self, id: i32) -> Option<CustomerFixture> {
        self.customers
            .read()
            .expect("store lock poisoned")
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    fn professional(&self, id: i32) -> Option<ProfessionalFixture> {
        self.professionals
            .read()
            .expect("store lock poisoned")
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    fn service(&self, id: i32) -> Option<ServiceFixture> {
        self.services
            .read()
            .expect("store lock poisoned")
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn closed_request_rows(&self) -> Result<Vec<ExportRow>, StoreError> {
        self.check_available()?;
        let requests = self.requests.read().expect("store lock poisoned").clone();
        let mut rows = Vec::new();
        for request in requests
            .iter()
            .filter(|r| r.status == ServiceStatus::Closed)
        {
            let (Some(customer), Some(professional), Some(service)) = (
                self.customer(request.customer_id),
                self.professional(request.professional_id),
                self.service(request.service_id),
            ) else {
                continue;
            };
            rows.push(ExportRow {
                request_id: request.id,
                customer_name: customer.name,
                professional_name: professional.name,
                service_name: service.name,
                status: request.status,
            });
        }
        rows.sort_by_key(|r| r.request_id);
        Ok(rows)
    }

    async fn professional_summaries(&self) -> Result<Vec<ProfessionalSummary>, StoreError> {
        self.check_available()?;
        let professionals = self
            .professionals
            .read()
            .expect("store lock poisoned")
            .clone();
        let requests = self.requests.read().expect("store lock poisoned").clone();
        Ok(professionals
            .iter()
            .map(|p| {
                let pending_requests = requests
                    .iter()
                    .filter(|r| r.professional_id == p.id && r.status.is_pending_for_professional())
                    .count() as i64;
                ProfessionalSummary {
                    name: p.name.clone(),
                    email: p.email.clone(),
                    pending_requests,
                }
            })
            .collect())
    }

    async fn customer_request_rows(&self) -> Result<Vec<CustomerRequestRow>, StoreError> {
        self.check_available()?;
        let customers = self.customers.read().expect("store lock poisoned").clone();
        let requests = self.requests.read().expect("store lock poisoned").clone();
        let mut rows = Vec::new();
        for customer in &customers {
            for request in requests.iter().filter(|r| r.customer_id == customer.id) {
                let Some(service) = self.service(request.service_id) else {
                    continue;
                };
                rows.push(CustomerRequestRow {
                    customer_name: customer.name.clone(),
                    customer_email: customer.email.clone(),
                    service_name: service.name,
                    status: request.status,
                });
            }
        }
        Ok(rows)
    }
}
