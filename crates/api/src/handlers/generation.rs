//! Handlers for batch generation and task progress.
//!
//! All endpoints require authentication via [`AuthUser`] and are scoped to
//! the caller's projects.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use storyreel_core::error::CoreError;
use storyreel_core::grouping::{GroupingOptions, DEFAULT_TOLERANCE_SECS};
use storyreel_core::media::MediaKind;
use storyreel_core::task::TaskStatus;
use storyreel_core::types::DbId;
use storyreel_db::models::task::{TaskListQuery, TaskScope};
use storyreel_db::store::ProjectStore;
use storyreel_pipeline::{BatchOptions, BatchRequest, BatchTarget};
use storyreel_providers::GenerationOptions;
use storyreel_storage::StorageMode;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetInput {
    ShotVideo,
    CharacterImage,
    CharacterVideo,
    DialogueAudio,
}

/// Provider knobs forwarded to every unit of the batch.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerationOptionsInput {
    #[validate(range(min = 0.5, max = 600.0))]
    pub duration: Option<f64>,
    #[validate(range(min = 64, max = 8192))]
    pub width: Option<u32>,
    #[validate(range(min = 64, max = 8192))]
    pub height: Option<u32>,
    #[validate(length(min = 1, max = 100))]
    pub voice: Option<String>,
    #[validate(range(min = 0.25, max = 4.0))]
    pub speed: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl From<GenerationOptionsInput> for GenerationOptions {
    fn from(input: GenerationOptionsInput) -> Self {
        GenerationOptions {
            duration_secs: input.duration,
            width: input.width,
            height: input.height,
            voice: input.voice,
            speed: input.speed,
            pitch: input.pitch,
            volume: input.volume,
            extra: input.extra,
        }
    }
}

/// Body of `POST /projects/{project_id}/generation/batches`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitBatchInput {
    pub target: TargetInput,
    #[validate(length(min = 1, max = 500))]
    pub subject_ids: Vec<DbId>,
    pub novel_id: Option<DbId>,
    pub act_id: Option<DbId>,
    /// Merge adjacent same-scene shots toward `max_duration` seconds.
    #[serde(default)]
    pub merge: bool,
    pub max_duration: Option<f64>,
    pub tolerance: Option<f64>,
    #[validate(range(min = 1))]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub allow_overwrite: bool,
    #[serde(default)]
    pub keep_both: bool,
    pub storage_mode: Option<StorageMode>,
    pub feature_prompt_id: Option<DbId>,
    #[serde(default)]
    #[validate(nested)]
    pub options: GenerationOptionsInput,
}

impl SubmitBatchInput {
    fn target(&self) -> BatchTarget {
        match self.target {
            TargetInput::ShotVideo => BatchTarget::ShotVideo {
                grouping: if self.merge {
                    GroupingOptions {
                        merge: true,
                        target_duration_secs: self.max_duration,
                        tolerance_secs: self.tolerance.unwrap_or(DEFAULT_TOLERANCE_SECS),
                    }
                } else {
                    GroupingOptions::singles()
                },
            },
            TargetInput::CharacterImage => BatchTarget::CharacterMedia {
                kind: MediaKind::Image,
            },
            TargetInput::CharacterVideo => BatchTarget::CharacterMedia {
                kind: MediaKind::Video,
            },
            TargetInput::DialogueAudio => BatchTarget::DialogueAudio,
        }
    }

    pub fn into_request(self, project_id: DbId) -> BatchRequest {
        let target = self.target();
        BatchRequest {
            project_id,
            novel_id: self.novel_id,
            act_id: self.act_id,
            target,
            subject_ids: self.subject_ids,
            options: BatchOptions {
                concurrency: self.concurrency,
                allow_overwrite: self.allow_overwrite,
                keep_both: self.keep_both,
                storage_mode: self.storage_mode,
                feature_prompt_id: self.feature_prompt_id,
                generation: self.options.into(),
            },
        }
    }
}

/// Query of the task listings.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListParams {
    pub novel_id: Option<DbId>,
    pub act_id: Option<DbId>,
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TaskListParams {
    fn query(&self) -> TaskListQuery {
        TaskListQuery {
            status: self.status,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/generation/batches
///
/// Validates the batch, creates one `pending` task per unit and returns 202
/// while generation continues in the background.
pub async fn submit_batch(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<SubmitBatchInput>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let submission = state
        .orchestrator
        .submit_batch(auth.owner_id, input.into_request(project_id))
        .await?;

    tracing::info!(
        batch_id = %submission.batch_id,
        project_id,
        owner_id = auth.owner_id,
        tasks = submission.tasks.len(),
        skipped = submission.skipped.len(),
        "Batch accepted",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submission })))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/v1/generation/tasks/{task_id}
pub async fn get_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let progress = state
        .orchestrator
        .get_task_progress(auth.owner_id, task_id)
        .await?;
    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// GET /api/v1/projects/{project_id}/generation/tasks
///
/// With `act_id` the listing narrows to that act; otherwise to the project,
/// optionally one novel of it.
pub async fn list_project_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<TaskListParams>,
) -> AppResult<impl IntoResponse> {
    let scope = match params.act_id {
        Some(act_id) => {
            state
                .store
                .find_project(project_id, auth.owner_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "Project",
                    id: project_id,
                })?;
            TaskScope::Act { act_id }
        }
        None => TaskScope::Project {
            project_id,
            novel_id: params.novel_id,
        },
    };

    let tasks = state
        .orchestrator
        .list_tasks_for(auth.owner_id, scope, &params.query())
        .await?;
    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/generation/tasks
///
/// Every task of the caller, newest first.
pub async fn list_my_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<TaskListParams>,
) -> AppResult<impl IntoResponse> {
    let tasks = state
        .orchestrator
        .list_tasks_for(auth.owner_id, TaskScope::Owner, &params.query())
        .await?;
    Ok(Json(DataResponse { data: tasks }))
}
