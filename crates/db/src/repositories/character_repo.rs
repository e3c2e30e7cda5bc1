//! Repository for the `characters` table.

use sqlx::PgPool;
use storyreel_core::media::MediaKind;
use storyreel_core::types::DbId;

use crate::models::character::Character;

/// Column list for `characters` queries, qualified for joins.
const COLUMNS: &str = "\
    c.id, c.project_id, c.name, c.gender, c.appearance, c.description, \
    c.voice_actor, c.image_url, c.image_path, c.video_url, c.video_path, \
    c.created_at, c.updated_at";

pub struct CharacterRepo;

impl CharacterRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Character>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM characters c WHERE c.id = $1");
        sqlx::query_as::<_, Character>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Match a character by exact name and gender inside one project.
    ///
    /// Used when a shot's reference id no longer exists (the character was
    /// re-extracted and got a new id).
    pub async fn find_by_name_and_gender(
        pool: &PgPool,
        project_id: DbId,
        name: &str,
        gender: &str,
    ) -> Result<Option<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters c \
             WHERE c.project_id = $1 AND c.name = $2 AND c.gender = $3 \
             ORDER BY c.id ASC LIMIT 1"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(project_id)
            .bind(name)
            .bind(gender)
            .fetch_optional(pool)
            .await
    }

    /// Characters among `ids` that belong to the project and owner.
    pub async fn list_owned(
        pool: &PgPool,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<Character>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM characters c \
             JOIN projects p ON p.id = c.project_id \
             WHERE c.project_id = $1 AND p.owner_id = $2 AND c.id = ANY($3) \
             ORDER BY c.id ASC"
        );
        sqlx::query_as::<_, Character>(&query)
            .bind(project_id)
            .bind(owner_id)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Store a generated image or video on the character.
    ///
    /// Returns `false` if the character does not exist. Audio is not a
    /// character media kind and is a no-op.
    pub async fn set_media(
        pool: &PgPool,
        id: DbId,
        kind: MediaKind,
        url: &str,
        path: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let sql = match kind {
            MediaKind::Image => {
                "UPDATE characters SET image_url = $2, image_path = $3, updated_at = NOW() WHERE id = $1"
            }
            MediaKind::Video => {
                "UPDATE characters SET video_url = $2, video_path = $3, updated_at = NOW() WHERE id = $1"
            }
            MediaKind::Audio => return Ok(false),
        };
        let result = sqlx::query(sql)
            .bind(id)
            .bind(url)
            .bind(path)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
