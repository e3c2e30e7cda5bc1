//! Repository for the `ai_models` table.

use sqlx::PgPool;
use storyreel_core::media::ModelType;
use storyreel_core::types::DbId;

use crate::models::ai_model::AiModel;

const COLUMNS: &str = "\
    id, name, provider, model_type, model_name, base_url, is_active, \
    created_at, updated_at";

pub struct AiModelRepo;

impl AiModelRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<AiModel>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM ai_models WHERE id = $1");
        sqlx::query_as::<_, AiModel>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active models of one type, oldest first. The first entry is the
    /// fallback when a project's configured model is unusable.
    pub async fn list_active(
        pool: &PgPool,
        model_type: ModelType,
    ) -> Result<Vec<AiModel>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ai_models \
             WHERE model_type = $1 AND is_active = true \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, AiModel>(&query)
            .bind(model_type.as_str())
            .fetch_all(pool)
            .await
    }
}
