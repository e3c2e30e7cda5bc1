//! Media kinds, model types, and MIME helpers.
//!
//! A [`MediaKind`] names what a generation unit produces. A [`ModelType`]
//! names the catalogue category a model is registered under. The two are
//! related but not identical (the catalogue also holds `llm` models).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fallback MIME type when neither the response nor the filename tells us.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Extensions accepted as video reference links on feature prompts.
pub const VIDEO_LINK_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi"];

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// The kind of asset a generation unit produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Default file extension (without the dot) for generated assets.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    /// Default MIME type for generated assets of this kind.
    pub fn default_mime_type(self) -> &'static str {
        match self {
            MediaKind::Image => "image/png",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }

    /// The catalogue category that models for this kind are registered under.
    pub fn model_type(self) -> ModelType {
        match self {
            MediaKind::Image => ModelType::Image,
            MediaKind::Video => ModelType::Video,
            MediaKind::Audio => ModelType::Tts,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(CoreError::Validation(format!(
                "Invalid media kind '{other}'. Must be one of: image, video, audio"
            ))),
        }
    }
}

impl TryFrom<String> for MediaKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// ModelType
// ---------------------------------------------------------------------------

/// Model catalogue category (`ai_models.model_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Llm,
    Video,
    Image,
    Tts,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Llm => "llm",
            ModelType::Video => "video",
            ModelType::Image => "image",
            ModelType::Tts => "tts",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(ModelType::Llm),
            "video" => Ok(ModelType::Video),
            "image" => Ok(ModelType::Image),
            "tts" => Ok(ModelType::Tts),
            other => Err(CoreError::Validation(format!(
                "Invalid model type '{other}'. Must be one of: llm, video, image, tts"
            ))),
        }
    }
}

impl TryFrom<String> for ModelType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// MIME / link helpers
// ---------------------------------------------------------------------------

/// Guess a MIME type from a filename or URL path extension.
///
/// Query strings and fragments are ignored. Unknown extensions yield `None`.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let path = name.split(&['?', '#'][..]).next().unwrap_or(name);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => return None,
    };
    Some(mime)
}

/// Whether a URL points at a remote resource (`http://` or `https://`).
pub fn is_remote_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Whether a link ends in one of [`VIDEO_LINK_EXTENSIONS`].
pub fn is_video_link(url: &str) -> bool {
    VIDEO_LINK_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- MediaKind --

    #[test]
    fn media_kind_round_trips_through_str() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Audio] {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
    }

    #[test]
    fn media_kind_rejects_unknown() {
        let err = "hologram".parse::<MediaKind>().unwrap_err();
        assert!(err.to_string().contains("hologram"));
    }

    #[test]
    fn audio_maps_to_tts_model_type() {
        assert_eq!(MediaKind::Audio.model_type(), ModelType::Tts);
        assert_eq!(MediaKind::Video.model_type(), ModelType::Video);
    }

    #[test]
    fn media_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MediaKind::Video).unwrap();
        assert_eq!(json, "\"video\"");
    }

    // -- MIME --

    #[test]
    fn mime_from_extension_ignores_query() {
        assert_eq!(
            mime_from_extension("https://cdn.example.com/a/b.MP4?sig=1"),
            Some("video/mp4")
        );
    }

    #[test]
    fn mime_from_extension_unknown_is_none() {
        assert_eq!(mime_from_extension("file.xyz"), None);
        assert_eq!(mime_from_extension("no_extension"), None);
    }

    // -- Links --

    #[test]
    fn video_link_filter_matches_known_extensions() {
        assert!(is_video_link("https://x/clip.mp4"));
        assert!(is_video_link("https://x/clip.mov"));
        assert!(is_video_link("https://x/clip.avi"));
        assert!(!is_video_link("https://x/still.png"));
    }

    #[test]
    fn remote_url_requires_http_scheme() {
        assert!(is_remote_url("https://a"));
        assert!(is_remote_url("http://a"));
        assert!(!is_remote_url("ftp://a"));
        assert!(!is_remote_url("/local/path.mp4"));
    }
}
