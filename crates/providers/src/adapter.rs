//! The uniform adapter contract shared by every provider.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use storyreel_core::media::MediaKind;

use crate::error::ProviderError;

/// Per-request knobs. Each adapter reads the ones it understands and
/// ignores the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub voice: Option<String>,
    pub speed: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
    /// Provider-specific parameters merged verbatim into the request body.
    pub extra: Map<String, Value>,
}

/// One generation call.
#[derive(Clone)]
pub struct GenerationRequest {
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub prompt: String,
    /// Conditioning media (character reference images or videos).
    pub reference_urls: Vec<String>,
    pub options: GenerationOptions,
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("prompt_chars", &self.prompt.chars().count())
            .field("reference_urls", &self.reference_urls)
            .field("options", &self.options)
            .finish()
    }
}

/// Where the generated asset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedAsset {
    /// A URL the storage pipeline fetches.
    Url(String),
    /// Bytes returned in the response body.
    Inline { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub asset: GeneratedAsset,
    /// Provider-side details worth keeping on the task (job id, sizes).
    pub metadata: Value,
}

impl GenerationOutput {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            asset: GeneratedAsset::Url(url.into()),
            metadata: Value::Object(Map::new()),
        }
    }

    pub fn inline(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            asset: GeneratedAsset::Inline {
                bytes,
                mime_type: mime_type.into(),
            },
            metadata: Value::Object(Map::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A generation backend for one media kind.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registry name, lowercase.
    fn name(&self) -> &'static str;

    fn kind(&self) -> MediaKind;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError>;
}
