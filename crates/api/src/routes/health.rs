use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use storyreel_db::store::StoreHealth;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the store is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether new batches are accepted (false once shutdown has begun).
    pub accepting_batches: bool,
    pub active_lanes: usize,
    pub running_tasks: usize,
}

/// GET /health -- service, store and executor health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };
    let executor = state.orchestrator.executor();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        accepting_batches: executor.is_accepting(),
        active_lanes: executor.active_lanes(),
        running_tasks: state.orchestrator.registry().running(),
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
