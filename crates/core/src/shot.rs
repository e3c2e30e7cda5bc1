//! Timeline shot units and character reference parsing.
//!
//! A [`ShotUnit`] is the read-only snapshot of one shot that grouping,
//! reference resolution and prompt composition work from. Character
//! references are stored on the shot row as JSON in one of two layouts;
//! [`parse_character_refs`] accepts both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Duration assumed for a shot that has none recorded (or a non-positive one).
pub const DEFAULT_SHOT_DURATION_SECS: f64 = 3.0;

/// Placeholder name for references that carry only an id.
pub const UNKNOWN_CHARACTER_NAME: &str = "Unknown";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A character mentioned by a shot, as recorded on the shot itself.
///
/// The id may be stale (the character could have been merged or recreated),
/// which is why `name` and `gender` travel with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRef {
    pub id: DbId,
    pub name: String,
    pub gender: Option<String>,
}

impl CharacterRef {
    /// Whether the name/gender pair is usable for a fallback lookup.
    pub fn has_identity(&self) -> bool {
        self.name != UNKNOWN_CHARACTER_NAME
            && !self.name.is_empty()
            && self.gender.as_deref().is_some_and(|g| !g.is_empty())
    }
}

/// One spoken line within a shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Option<String>,
    pub text: String,
}

/// Snapshot of one timeline shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotUnit {
    pub id: DbId,
    pub project_id: DbId,
    pub scene_id: Option<DbId>,
    pub order: Option<i32>,
    pub shot_number: Option<i32>,
    pub duration_secs: Option<f64>,
    pub description: Option<String>,
    pub camera: Option<String>,
    pub mood: Option<String>,
    pub dialogue: Vec<DialogueLine>,
    pub characters: Vec<CharacterRef>,
    pub existing_video_url: Option<String>,
}

impl ShotUnit {
    /// Recorded duration, or [`DEFAULT_SHOT_DURATION_SECS`] when absent or
    /// not positive.
    pub fn effective_duration(&self) -> f64 {
        match self.duration_secs {
            Some(d) if d > 0.0 => d,
            _ => DEFAULT_SHOT_DURATION_SECS,
        }
    }

    /// Timeline position: `order`, falling back to `shot_number`, then 0.
    pub fn timeline_position(&self) -> i64 {
        self.order
            .or(self.shot_number)
            .map(i64::from)
            .unwrap_or(0)
    }

    pub fn has_video(&self) -> bool {
        self.existing_video_url
            .as_deref()
            .is_some_and(|u| !u.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Character reference parsing
// ---------------------------------------------------------------------------

/// Parse the character references recorded on a shot.
///
/// `character_list` (array of `{id, name, gender}` objects) wins when it is
/// a non-empty array. Otherwise the legacy `character_ids` column is read,
/// which holds either objects of the same shape or bare ids. Either column
/// may also hold its JSON as a string. Entries without a usable id are
/// dropped.
pub fn parse_character_refs(
    character_list: Option<&Value>,
    legacy_ids: Option<&Value>,
) -> Vec<CharacterRef> {
    if let Some(items) = character_list.and_then(as_array) {
        if !items.is_empty() {
            return items.iter().filter_map(ref_from_object).collect();
        }
    }

    let Some(items) = legacy_ids.and_then(as_array) else {
        return Vec::new();
    };

    match items.first() {
        Some(Value::Object(_)) => items.iter().filter_map(ref_from_object).collect(),
        Some(_) => items
            .iter()
            .filter_map(id_from_value)
            .map(|id| CharacterRef {
                id,
                name: UNKNOWN_CHARACTER_NAME.to_string(),
                gender: None,
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Accept an array directly or a string holding a JSON array.
fn as_array(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn ref_from_object(value: &Value) -> Option<CharacterRef> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(id_from_value)?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_CHARACTER_NAME)
        .to_string();
    let gender = obj
        .get("gender")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(CharacterRef { id, name, gender })
}

fn id_from_value(value: &Value) -> Option<DbId> {
    match value {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => s.trim().parse::<DbId>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
