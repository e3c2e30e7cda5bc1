//! Repository for the `dialogues` table.

use sqlx::PgPool;
use storyreel_core::types::DbId;

use crate::models::dialogue::Dialogue;

const COLUMNS: &str = "\
    d.id, d.project_id, d.shot_id, d.character_id, d.speaker, d.content, \
    d.sort_order, d.audio_url, d.audio_path, d.created_at, d.updated_at";

pub struct DialogueRepo;

impl DialogueRepo {
    /// Dialogue lines attached to any of `shot_ids`, in speaking order.
    pub async fn list_for_shots(
        pool: &PgPool,
        shot_ids: &[DbId],
    ) -> Result<Vec<Dialogue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dialogues d \
             WHERE d.shot_id = ANY($1) \
             ORDER BY d.shot_id ASC, d.sort_order ASC, d.id ASC"
        );
        sqlx::query_as::<_, Dialogue>(&query)
            .bind(shot_ids)
            .fetch_all(pool)
            .await
    }

    /// Dialogue lines among `ids` that belong to the project and owner.
    pub async fn list_owned(
        pool: &PgPool,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<Dialogue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM dialogues d \
             JOIN projects p ON p.id = d.project_id \
             WHERE d.project_id = $1 AND p.owner_id = $2 AND d.id = ANY($3) \
             ORDER BY d.sort_order ASC, d.id ASC"
        );
        sqlx::query_as::<_, Dialogue>(&query)
            .bind(project_id)
            .bind(owner_id)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    pub async fn set_audio(
        pool: &PgPool,
        id: DbId,
        url: &str,
        path: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE dialogues SET audio_url = $2, audio_path = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(url)
        .bind(path)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
