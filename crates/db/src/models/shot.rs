//! Shot entity models.

use serde::Serialize;
use sqlx::FromRow;
use storyreel_core::shot::{parse_character_refs, DialogueLine, ShotUnit};
use storyreel_core::types::{DbId, Timestamp};

/// A row from the `shots` table.
///
/// `character_list` holds `[{id, name, gender}]`; `character_ids` is the
/// older id-only column and is read only when the list is empty.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Shot {
    pub id: DbId,
    pub project_id: DbId,
    pub novel_id: Option<DbId>,
    pub scene_id: Option<DbId>,
    pub sort_order: Option<i32>,
    pub shot_number: Option<i32>,
    pub duration: Option<f64>,
    pub description: Option<String>,
    pub camera: Option<String>,
    pub mood: Option<String>,
    pub character_list: Option<serde_json::Value>,
    pub character_ids: Option<serde_json::Value>,
    pub video_url: Option<String>,
    pub video_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Shot {
    /// Snapshot this row as a generation unit with its dialogue attached.
    pub fn into_unit(self, dialogue: Vec<DialogueLine>) -> ShotUnit {
        let characters =
            parse_character_refs(self.character_list.as_ref(), self.character_ids.as_ref());
        ShotUnit {
            id: self.id,
            project_id: self.project_id,
            scene_id: self.scene_id,
            order: self.sort_order,
            shot_number: self.shot_number,
            duration_secs: self.duration,
            description: self.description,
            camera: self.camera,
            mood: self.mood,
            dialogue,
            characters,
            existing_video_url: self.video_url,
        }
    }
}
