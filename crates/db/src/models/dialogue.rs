//! Dialogue line entity models.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::shot::DialogueLine;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `dialogues` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Dialogue {
    pub id: DbId,
    pub project_id: DbId,
    pub shot_id: Option<DbId>,
    pub character_id: Option<DbId>,
    pub speaker: Option<String>,
    pub content: String,
    pub sort_order: i32,
    pub audio_url: Option<String>,
    pub audio_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Dialogue {
    pub fn has_audio(&self) -> bool {
        self.audio_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn to_line(&self) -> DialogueLine {
        DialogueLine {
            speaker: self.speaker.clone(),
            text: self.content.clone(),
        }
    }
}
