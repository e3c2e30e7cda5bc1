//! Local storage layout: `{base}/{kind dir}/{subject id}/{filename}`.

use std::path::{Path, PathBuf};

use storyreel_core::media::MediaKind;
use storyreel_core::types::DbId;

/// Where one asset is stored, relative to the storage base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub kind: MediaKind,
    pub subject_id: DbId,
    pub filename: String,
}

/// Milliseconds since the Unix epoch, used to keep filenames unique.
pub fn now_stamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn kind_dir(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "images",
        MediaKind::Video => "videos",
        MediaKind::Audio => "audio",
    }
}

impl StorageTarget {
    pub fn shot(shot_id: DbId, stamp: i64) -> Self {
        Self {
            kind: MediaKind::Video,
            subject_id: shot_id,
            filename: format!("shot_{shot_id}_{stamp}.mp4"),
        }
    }

    /// Target for a merged group, named after its first shot.
    pub fn merged(first_shot_id: DbId, stamp: i64) -> Self {
        Self {
            kind: MediaKind::Video,
            subject_id: first_shot_id,
            filename: format!("merged_{first_shot_id}_{stamp}.mp4"),
        }
    }

    pub fn character(character_id: DbId, kind: MediaKind, stamp: i64) -> Self {
        Self {
            kind,
            subject_id: character_id,
            filename: format!("character_{character_id}_{stamp}.{}", kind.default_extension()),
        }
    }

    pub fn dialogue(dialogue_id: DbId, stamp: i64) -> Self {
        Self {
            kind: MediaKind::Audio,
            subject_id: dialogue_id,
            filename: format!("dialogue_{dialogue_id}_{stamp}.mp3"),
        }
    }

    /// Path relative to the storage base, always with `/` separators.
    pub fn relative_path(&self) -> String {
        format!("{}/{}/{}", kind_dir(self.kind), self.subject_id, self.filename)
    }

    pub fn absolute_path(&self, base: &Path) -> PathBuf {
        base.join(kind_dir(self.kind))
            .join(self.subject_id.to_string())
            .join(&self.filename)
    }
}
