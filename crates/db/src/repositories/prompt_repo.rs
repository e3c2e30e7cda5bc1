//! Repository for `system_prompts` and `feature_prompts`.

use sqlx::PgPool;
use storyreel_core::types::DbId;

use crate::models::prompt::{FeaturePromptRow, SystemPrompt};

pub struct PromptRepo;

impl PromptRepo {
    pub async fn find_system(
        pool: &PgPool,
        function_key: &str,
    ) -> Result<Option<SystemPrompt>, sqlx::Error> {
        sqlx::query_as::<_, SystemPrompt>(
            "SELECT id, function_key, content, updated_at FROM system_prompts \
             WHERE function_key = $1",
        )
        .bind(function_key)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_feature(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<FeaturePromptRow>, sqlx::Error> {
        sqlx::query_as::<_, FeaturePromptRow>(
            "SELECT id, name, prompt, reference_links, updated_at FROM feature_prompts \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
