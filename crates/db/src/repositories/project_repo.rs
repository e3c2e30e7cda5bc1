//! Repository for the `projects` table.

use sqlx::PgPool;
use storyreel_core::types::DbId;

use crate::models::project::Project;

/// Column list for `projects` queries.
const COLUMNS: &str = "\
    id, owner_id, name, \
    video_model_id, video_api_key, \
    image_model_id, image_api_key, \
    tts_model_id, tts_api_key, \
    created_at, updated_at";

pub struct ProjectRepo;

impl ProjectRepo {
    /// Find a project only if it belongs to `owner_id`.
    pub async fn find_owned(
        pool: &PgPool,
        id: DbId,
        owner_id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }
}
