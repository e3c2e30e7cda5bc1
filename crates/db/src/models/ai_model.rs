//! Registered generation models.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::media::ModelType;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `ai_models` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AiModel {
    pub id: DbId,
    pub name: String,
    pub provider: String,
    #[sqlx(try_from = "String")]
    pub model_type: ModelType,
    pub model_name: String,
    pub base_url: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AiModel {
    /// Whether this model may serve requests of `model_type`.
    pub fn serves(&self, model_type: ModelType) -> bool {
        self.is_active && self.model_type == model_type
    }
}
