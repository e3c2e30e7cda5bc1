//! Route definitions for generation batches and tasks.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/projects/{project_id}/generation`.
///
/// ```text
/// POST   /batches         -> submit_batch
/// GET    /tasks           -> list_project_tasks
/// ```
pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/batches", post(generation::submit_batch))
        .route("/tasks", get(generation::list_project_tasks))
}

/// Routes mounted at `/generation`.
///
/// ```text
/// GET    /tasks           -> list_my_tasks
/// GET    /tasks/{task_id} -> get_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(generation::list_my_tasks))
        .route("/tasks/{task_id}", get(generation::get_task))
}
