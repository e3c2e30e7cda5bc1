//! Character entity models.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::media::MediaKind;
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `characters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Character {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub gender: Option<String>,
    pub appearance: Option<String>,
    pub description: Option<String>,
    pub voice_actor: Option<String>,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
    pub video_url: Option<String>,
    pub video_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Character {
    /// Existing media URL of the given kind, if any. Empty strings count as absent.
    pub fn media_url(&self, kind: MediaKind) -> Option<&str> {
        let url = match kind {
            MediaKind::Image => self.image_url.as_deref(),
            MediaKind::Video => self.video_url.as_deref(),
            MediaKind::Audio => None,
        };
        url.filter(|u| !u.trim().is_empty())
    }
}
