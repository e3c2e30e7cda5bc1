//! Repository for the `generation_tasks` table.
//!
//! Status changes are guarded in SQL: each transition only matches rows
//! whose current status is a legal predecessor of the target status (see
//! [`TaskStatus::predecessors`]). A transition that matches no row returns
//! `false` and leaves the row untouched.

use sqlx::PgPool;
use storyreel_core::task::{TaskStatus, PROGRESS_DONE};
use storyreel_core::types::DbId;

use crate::models::task::{GenerationTask, NewTask, TaskListQuery, TaskScope};

/// Column list for `generation_tasks` queries.
const COLUMNS: &str = "\
    id, owner_id, project_id, novel_id, act_id, subject_type, subject_id, \
    kind, status, progress, model_id, result_url, result_path, error_message, \
    metadata, created_at, started_at, completed_at, updated_at";

fn predecessor_names(next: TaskStatus) -> Vec<String> {
    TaskStatus::predecessors(next)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

pub struct TaskRepo;

impl TaskRepo {
    /// Insert every task of a batch as `pending` in one transaction.
    ///
    /// Either all rows are created or none are.
    pub async fn create_batch(
        pool: &PgPool,
        inputs: &[NewTask],
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_tasks \
                (owner_id, project_id, novel_id, act_id, subject_type, subject_id, \
                 kind, status, progress, model_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, $10) \
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let task = sqlx::query_as::<_, GenerationTask>(&query)
                .bind(input.owner_id)
                .bind(input.project_id)
                .bind(input.novel_id)
                .bind(input.act_id)
                .bind(input.subject_type.as_str())
                .bind(input.subject_id)
                .bind(input.kind.as_str())
                .bind(TaskStatus::Pending.as_str())
                .bind(input.model_id)
                .bind(&input.metadata)
                .fetch_one(&mut *tx)
                .await?;
            created.push(task);
        }
        tx.commit().await?;
        Ok(created)
    }

    /// `pending -> processing`. Sets `started_at`.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_tasks \
             SET status = $2, started_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(TaskStatus::Processing.as_str())
        .bind(predecessor_names(TaskStatus::Processing))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record intermediate progress on a processing task.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        progress: i16,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_tasks SET progress = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(id)
        .bind(progress)
        .bind(TaskStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `processing -> completed` with the published result.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        result_url: &str,
        result_path: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_tasks \
             SET status = $2, progress = $3, result_url = $4, result_path = $5, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = ANY($6)",
        )
        .bind(id)
        .bind(TaskStatus::Completed.as_str())
        .bind(PROGRESS_DONE)
        .bind(result_url)
        .bind(result_path)
        .bind(predecessor_names(TaskStatus::Completed))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `pending | processing -> failed`. `metadata_patch` is merged into the
    /// existing metadata object.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
        metadata_patch: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generation_tasks \
             SET status = $2, error_message = $3, metadata = metadata || $4::jsonb, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status = ANY($5)",
        )
        .bind(id)
        .bind(TaskStatus::Failed.as_str())
        .bind(error_message)
        .bind(metadata_patch)
        .bind(predecessor_names(TaskStatus::Failed))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<GenerationTask>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM generation_tasks WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List an owner's tasks in a scope, newest first.
    pub async fn list(
        pool: &PgPool,
        owner_id: DbId,
        scope: TaskScope,
        params: &TaskListQuery,
    ) -> Result<Vec<GenerationTask>, sqlx::Error> {
        let (project_id, novel_id, act_id) = match scope {
            TaskScope::Project { project_id, novel_id } => (Some(project_id), novel_id, None),
            TaskScope::Act { act_id } => (None, None, Some(act_id)),
            TaskScope::Owner => (None, None, None),
        };
        let query = format!(
            "SELECT {COLUMNS} FROM generation_tasks \
             WHERE owner_id = $1 \
               AND ($2::BIGINT IS NULL OR project_id = $2) \
               AND ($3::BIGINT IS NULL OR novel_id = $3) \
               AND ($4::BIGINT IS NULL OR act_id = $4) \
               AND ($5::TEXT IS NULL OR status = $5) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, GenerationTask>(&query)
            .bind(owner_id)
            .bind(project_id)
            .bind(novel_id)
            .bind(act_id)
            .bind(params.status.map(TaskStatus::as_str))
            .bind(params.effective_limit())
            .bind(params.effective_offset())
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_lists_match_the_state_machine() {
        assert_eq!(predecessor_names(TaskStatus::Processing), vec!["pending"]);
        assert_eq!(predecessor_names(TaskStatus::Completed), vec!["processing"]);
        assert_eq!(predecessor_names(TaskStatus::Failed), vec!["pending", "processing"]);
    }
}
