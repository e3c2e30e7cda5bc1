//! Synchronous image providers.

use async_trait::async_trait;
use serde_json::{json, Value};
use storyreel_core::media::MediaKind;

use crate::adapter::{GenerationOutput, GenerationRequest, ProviderAdapter};
use crate::error::ProviderError;
use crate::http::{endpoint, ensure_success, first_string, merge_extra, parse_json, post_json, read_bytes};
use crate::video::grsai_result_url;

pub const DEFAULT_IMAGE_WIDTH: u32 = 1024;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 1024;

const OPENAI_DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const STABILITY_DEFAULT_ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

fn dimensions(request: &GenerationRequest) -> (u32, u32) {
    (
        request.options.width.unwrap_or(DEFAULT_IMAGE_WIDTH),
        request.options.height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
    )
}

fn model_or<'a>(request: &'a GenerationRequest, default: &'a str) -> &'a str {
    Some(request.model_name.trim())
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OpenAiImage {
    client: reqwest::Client,
}

impl OpenAiImage {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        let (width, height) = dimensions(request);
        merge_extra(
            json!({
                "model": model_or(request, OPENAI_DEFAULT_IMAGE_MODEL),
                "prompt": request.prompt,
                "n": 1,
                "size": format!("{width}x{height}"),
            }),
            &request.options.extra,
        )
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiImage {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let url = endpoint(&request.base_url, "images/generations");
        let response = post_json(&self.client, &url, &request.api_key, &Self::body(request)).await?;
        let body: Value = parse_json(response).await?;
        first_string(&body, &["/data/0/url"])
            .map(GenerationOutput::url)
            .ok_or_else(|| ProviderError::InvalidResponse("OpenAI image response has no data[0].url".into()))
    }
}

// ---------------------------------------------------------------------------
// grsai
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GrsaiImage {
    client: reqwest::Client,
}

impl GrsaiImage {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn body(request: &GenerationRequest) -> Value {
        let (width, height) = dimensions(request);
        let mut body = json!({
            "prompt": request.prompt,
            "width": width,
            "height": height,
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

#[async_trait]
impl ProviderAdapter for GrsaiImage {
    fn name(&self) -> &'static str {
        "grsai"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let response =
            post_json(&self.client, &request.base_url, &request.api_key, &Self::body(request)).await?;
        let body: Value = ensure_success(response).await?.json().await?;
        grsai_result_url(&body, "imageUrl")
            .map(GenerationOutput::url)
            .ok_or_else(|| ProviderError::InvalidResponse("Invalid response format from grsai".into()))
    }
}

// ---------------------------------------------------------------------------
// Stability
// ---------------------------------------------------------------------------

/// Text-to-image returning raw PNG bytes.
#[derive(Debug, Clone)]
pub struct StabilityImage {
    client: reqwest::Client,
}

impl StabilityImage {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url(request: &GenerationRequest) -> String {
        let engine = model_or(request, STABILITY_DEFAULT_ENGINE);
        endpoint(&request.base_url, &format!("generation/{engine}/text-to-image"))
    }

    fn body(request: &GenerationRequest) -> Value {
        let (width, height) = dimensions(request);
        merge_extra(
            json!({
                "text_prompts": [{ "text": request.prompt }],
                "cfg_scale": 7,
                "width": width,
                "height": height,
                "steps": 30,
            }),
            &request.options.extra,
        )
    }
}

#[async_trait]
impl ProviderAdapter for StabilityImage {
    fn name(&self) -> &'static str {
        "stability"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let response = self
            .client
            .post(Self::url(request))
            .bearer_auth(&request.api_key)
            .header(reqwest::header::ACCEPT, "image/png")
            .json(&Self::body(request))
            .send()
            .await?;
        let (bytes, mime_type) = read_bytes(response, "image/png").await?;
        let size = bytes.len();
        Ok(GenerationOutput::inline(bytes, mime_type).with_metadata(json!({ "size": size })))
    }
}
