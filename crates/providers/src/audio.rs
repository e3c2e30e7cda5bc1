//! Text-to-speech providers. Both return audio bytes in the response body.

use async_trait::async_trait;
use serde_json::{json, Value};
use storyreel_core::media::MediaKind;

use crate::adapter::{GenerationOutput, GenerationRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::http::{endpoint, merge_extra, post_json, read_bytes};

pub const OPENAI_DEFAULT_VOICE: &str = "alloy";
const OPENAI_DEFAULT_TTS_MODEL: &str = "tts-1";

pub const DOUBAO_DEFAULT_VOICE: &str = "BV700_streaming";
const DOUBAO_DEFAULT_TTS_MODEL: &str = "doubao-tts";

const AUDIO_MIME: &str = "audio/mpeg";

fn model_or<'a>(request: &'a GenerationRequest, default: &'a str) -> &'a str {
    Some(request.model_name.trim())
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
}

fn voice_or<'a>(request: &'a GenerationRequest, default: &'a str) -> &'a str {
    request
        .options
        .voice
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

async fn speech(
    client: &reqwest::Client,
    url: &str,
    request: &GenerationRequest,
    body: &Value,
) -> Result<GenerationOutput, ProviderError> {
    let response = post_json(client, url, &request.api_key, body).await?;
    let (bytes, mime_type) = read_bytes(response, AUDIO_MIME).await?;
    let size = bytes.len();
    Ok(GenerationOutput::inline(bytes, mime_type).with_metadata(json!({ "size": size })))
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        merge_extra(
            json!({
                "model": model_or(request, OPENAI_DEFAULT_TTS_MODEL),
                "input": request.prompt,
                "voice": voice_or(request, OPENAI_DEFAULT_VOICE),
                "speed": request.options.speed.unwrap_or(1.0),
            }),
            &request.options.extra,
        )
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiSpeech {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let url = endpoint(&request.base_url, "audio/speech");
        speech(&self.client, &url, request, &Self::body(request)).await
    }
}

// ---------------------------------------------------------------------------
// Doubao / Volcengine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DoubaoSpeech {
    client: reqwest::Client,
}

impl DoubaoSpeech {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        let options = &request.options;
        merge_extra(
            json!({
                "model": model_or(request, DOUBAO_DEFAULT_TTS_MODEL),
                "text": request.prompt,
                "voice": voice_or(request, DOUBAO_DEFAULT_VOICE),
                "speed": options.speed.unwrap_or(1.0),
                "pitch": options.pitch.unwrap_or(1.0),
                "volume": options.volume.unwrap_or(1.0),
            }),
            &options.extra,
        )
    }
}

#[async_trait]
impl ProviderAdapter for DoubaoSpeech {
    fn name(&self) -> &'static str {
        "doubao"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let url = endpoint(&request.base_url, "tts");
        speech(&self.client, &url, request, &Self::body(request)).await
    }
}
