//! Synchronous video providers.

use async_trait::async_trait;
use serde_json::{json, Value};
use storyreel_core::media::MediaKind;

use crate::adapter::{GenerationOutput, GenerationRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::http::{endpoint, ensure_success, first_string, merge_extra, parse_json, post_json};

/// Duration requested from grsai when the unit does not specify one.
const GRSAI_DEFAULT_DURATION_SECS: f64 = 2.0;

/// Model requested from OpenAI when none is configured.
const OPENAI_DEFAULT_VIDEO_MODEL: &str = "sora";

fn model_or<'a>(request: &'a GenerationRequest, default: &'a str) -> &'a str {
    let model = request.model_name.trim();
    if model.is_empty() {
        default
    } else {
        model
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// `POST {base}/videos/generations`, result at `data[0].url`.
#[derive(Debug, Clone)]
pub struct OpenAiVideo {
    client: reqwest::Client,
}

impl OpenAiVideo {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": model_or(request, OPENAI_DEFAULT_VIDEO_MODEL),
            "prompt": request.prompt,
        });
        if let Some(duration) = request.options.duration_secs {
            body["duration"] = json!(duration);
        }
        if !request.reference_urls.is_empty() {
            body["reference_urls"] = json!(request.reference_urls);
        }
        merge_extra(body, &request.options.extra)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiVideo {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let url = endpoint(&request.base_url, "videos/generations");
        let response = post_json(&self.client, &url, &request.api_key, &Self::body(request)).await?;
        let body: Value = parse_json(response).await?;
        first_string(&body, &["/data/0/url"])
            .map(GenerationOutput::url)
            .ok_or_else(|| ProviderError::InvalidResponse("OpenAI video response has no data[0].url".into()))
    }
}

// ---------------------------------------------------------------------------
// grsai
// ---------------------------------------------------------------------------

/// `POST {base}` directly; the result URL is at `videoUrl`, `data.url` or `url`.
#[derive(Debug, Clone)]
pub struct GrsaiVideo {
    client: reqwest::Client,
}

impl GrsaiVideo {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        let mut body = json!({
            "prompt": request.prompt,
            "duration": request.options.duration_secs.unwrap_or(GRSAI_DEFAULT_DURATION_SECS),
        });
        if !request.model_name.trim().is_empty() {
            body["model"] = json!(request.model_name.trim());
        }
        if !request.reference_urls.is_empty() {
            body["urls"] = json!(request.reference_urls);
        }
        merge_extra(body, &request.options.extra)
    }
}

/// Pull the video URL out of a grsai response body.
pub(crate) fn grsai_result_url(body: &Value, primary_key: &str) -> Option<String> {
    let primary = format!("/{primary_key}");
    first_string(body, &[primary.as_str(), "/data/url", "/url"])
}

#[async_trait]
impl ProviderAdapter for GrsaiVideo {
    fn name(&self) -> &'static str {
        "grsai"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let response =
            post_json(&self.client, &request.base_url, &request.api_key, &Self::body(request)).await?;
        let body: Value = ensure_success(response).await?.json().await?;
        grsai_result_url(&body, "videoUrl")
            .map(GenerationOutput::url)
            .ok_or_else(|| ProviderError::InvalidResponse("Invalid response format from grsai".into()))
    }
}
