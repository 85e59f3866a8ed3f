//! HTTP transport for the orchestrator.
//!
//! Public routes accept expressions and report their status; internal
//! routes are polled by worker agents for tasks and results.

pub mod dto;
mod handlers;

pub use handlers::{ApiError, AppState};

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::orchestration::Orchestrator;
use crate::{dlog, Result};

/// Build the router over a shared orchestrator.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/v1/calculate", post(handlers::calculate))
        .route("/api/v1/expressions", get(handlers::list_expressions))
        .route("/api/v1/expressions/{id}", get(handlers::get_expression))
        .route(
            "/internal/task",
            get(handlers::next_task).post(handlers::submit_task_result),
        )
        .with_state(orchestrator)
}

/// Serve the API on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, orchestrator, shutdown).await
}

/// Serve the API on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> Result<()> {
    dlog!("Orchestrator listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    dlog!("Orchestrator stopped");
    Ok(())
}
