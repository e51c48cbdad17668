//! HTTP boundary for job submission and polling.
//!
//! - `POST /jobs/{task}` enqueues the named task and answers 202 with the
//!   job id.
//! - `GET /jobs/{id}` answers 404 for never-issued ids, 202 while pending
//!   or running, 500 with the error for failed jobs, and on success either
//!   streams the CSV artifact as an attachment (export jobs) or returns the
//!   result JSON.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::facade::{JobClient, PollStatus, SubmitError};
use crate::job::{JobId, TaskName};

/// Running HTTP server handle.
pub struct HttpServer {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl HttpServer {
    pub async fn start(addr: SocketAddr, client: JobClient) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind http listener on {addr}"))?;
        let actual_addr = listener.local_addr()?;

        let state = AppState { client };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_server(listener, state, shutdown_rx));

        info!(addr = %actual_addr, "http server started");
        Ok(Self {
            addr: actual_addr,
            shutdown_tx,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight responses to
    /// finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

#[derive(Clone)]
struct AppState {
    client: JobClient,
}

async fn run_server(listener: TcpListener, state: AppState, shutdown_rx: oneshot::Receiver<()>) {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .ok();
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/jobs/{name}", post(submit_job).get(poll_job))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "taskmill" }))
}

async fn submit_job(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.client.submit_named(&name).await {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(json!({ "task_id": job_id }))).into_response(),
        Err(SubmitError::UnknownTask(err)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ SubmitError::QueueClosed) => {
            error!(error = %err, "submission failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "job queue is unavailable" })),
            )
                .into_response()
        }
    }
}

async fn poll_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // An id that was never issued and an unparsable id are the same answer.
    let Ok(raw) = id.parse::<Uuid>() else {
        return not_found();
    };
    match state.client.poll(JobId(raw)) {
        PollStatus::NotFound => not_found(),
        PollStatus::Pending => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))).into_response()
        }
        PollStatus::Failed { error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failure", "error": error })),
        )
            .into_response(),
        PollStatus::Ready { task, result } => match task {
            TaskName::ExportClosedRequests => stream_artifact(&result).await,
            _ => (
                StatusCode::OK,
                Json(json!({ "status": "success", "result": result })),
            )
                .into_response(),
        },
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "not_found" })),
    )
        .into_response()
}

async fn stream_artifact(result: &serde_json::Value) -> Response {
    let Some(path) = result.get("artifact").and_then(|v| v.as_str()) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failure", "error": "artifact path missing from result" })),
        )
            .into_response();
    };
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let filename = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("export.csv");
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(err) => {
            error!(path, error = %err, "failed to read artifact");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failure", "error": "artifact unavailable" })),
            )
                .into_response()
        }
    }
}
