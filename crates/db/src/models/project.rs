//! Project entity: the ownership scope for every generation subject.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::media::ModelType;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `projects` table.
///
/// Each generation kind carries its configured model id and the credential
/// ciphertext for it. The ciphertext is never serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub video_model_id: Option<DbId>,
    #[serde(skip_serializing)]
    pub video_api_key: Option<String>,
    pub image_model_id: Option<DbId>,
    #[serde(skip_serializing)]
    pub image_api_key: Option<String>,
    pub tts_model_id: Option<DbId>,
    #[serde(skip_serializing)]
    pub tts_api_key: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// Configured model id and credential ciphertext for a model type.
    ///
    /// LLM models are not configured per project.
    pub fn model_preference(&self, model_type: ModelType) -> (Option<DbId>, Option<&str>) {
        match model_type {
            ModelType::Video => (self.video_model_id, self.video_api_key.as_deref()),
            ModelType::Image => (self.image_model_id, self.image_api_key.as_deref()),
            ModelType::Tts => (self.tts_model_id, self.tts_api_key.as_deref()),
            ModelType::Llm => (None, None),
        }
    }
}
