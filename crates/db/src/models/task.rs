//! Generation task models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyreel_core::media::MediaKind;
use storyreel_core::task::{SubjectType, TaskStatus};
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `generation_tasks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    pub id: DbId,
    pub owner_id: DbId,
    pub project_id: DbId,
    pub novel_id: Option<DbId>,
    pub act_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub subject_type: SubjectType,
    pub subject_id: DbId,
    #[sqlx(try_from = "String")]
    pub kind: MediaKind,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub progress: i16,
    pub model_id: Option<DbId>,
    pub result_url: Option<String>,
    pub result_path: Option<String>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl GenerationTask {
    /// The caller-facing progress view of this task.
    pub fn progress_view(&self) -> TaskProgress {
        TaskProgress {
            task_id: self.id,
            status: self.status,
            progress: self.progress,
            result_url: self.result_url.clone(),
            result_path: self.result_path.clone(),
            error_message: self.error_message.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Input for creating a pending task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub owner_id: DbId,
    pub project_id: DbId,
    pub novel_id: Option<DbId>,
    pub act_id: Option<DbId>,
    pub subject_type: SubjectType,
    pub subject_id: DbId,
    pub kind: MediaKind,
    pub model_id: Option<DbId>,
    pub metadata: serde_json::Value,
}

/// Who a task listing is scoped to. Every scope is also narrowed to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Project { project_id: DbId, novel_id: Option<DbId> },
    Act { act_id: DbId },
    Owner,
}

/// Query parameters for task listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// Maximum page size for task listings.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for task listings.
pub const DEFAULT_LIMIT: i64 = 50;

impl TaskListQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Progress snapshot returned to callers polling a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: DbId,
    pub status: TaskStatus,
    pub progress: i16,
    pub result_url: Option<String>,
    pub result_path: Option<String>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(TaskListQuery::default().effective_limit(), DEFAULT_LIMIT);
        let q = TaskListQuery { limit: Some(500), ..Default::default() };
        assert_eq!(q.effective_limit(), MAX_LIMIT);
        let q = TaskListQuery { limit: Some(0), offset: Some(-3), ..Default::default() };
        assert_eq!(q.effective_limit(), 1);
        assert_eq!(q.effective_offset(), 0);
    }
}
