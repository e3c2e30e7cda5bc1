//! Repository for the `shots` table.

use sqlx::PgPool;
use storyreel_core::types::DbId;

use crate::models::shot::Shot;

const COLUMNS: &str = "\
    s.id, s.project_id, s.novel_id, s.scene_id, s.sort_order, s.shot_number, \
    s.duration, s.description, s.camera, s.mood, \
    s.character_list, s.character_ids, s.video_url, s.video_path, \
    s.created_at, s.updated_at";

pub struct ShotRepo;

impl ShotRepo {
    /// Shots among `ids` that belong to the project and owner, optionally
    /// narrowed to one novel.
    pub async fn list_owned(
        pool: &PgPool,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
        novel_id: Option<DbId>,
    ) -> Result<Vec<Shot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM shots s \
             JOIN projects p ON p.id = s.project_id \
             WHERE s.project_id = $1 AND p.owner_id = $2 AND s.id = ANY($3) \
               AND ($4::BIGINT IS NULL OR s.novel_id = $4) \
             ORDER BY s.sort_order ASC NULLS LAST, s.shot_number ASC NULLS LAST, s.id ASC"
        );
        sqlx::query_as::<_, Shot>(&query)
            .bind(project_id)
            .bind(owner_id)
            .bind(ids)
            .bind(novel_id)
            .fetch_all(pool)
            .await
    }

    /// Write one video to every shot in `ids`. Returns the number of rows updated.
    pub async fn set_video(
        pool: &PgPool,
        ids: &[DbId],
        url: &str,
        path: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE shots SET video_url = $2, video_path = $3, updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(url)
        .bind(path)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
