pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /projects/{project_id}/generation/batches   submit a batch (POST)
/// /projects/{project_id}/generation/tasks     project task listing
/// /generation/tasks                           the caller's tasks
/// /generation/tasks/{task_id}                 task progress
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/projects/{project_id}/generation", generation::project_router())
        .nest("/generation", generation::router())
}
