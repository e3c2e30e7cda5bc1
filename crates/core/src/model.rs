//! Resolved generation model configuration.

use std::fmt;

use crate::media::ModelType;
use crate::types::DbId;

/// Everything an adapter needs to call a provider for one batch.
///
/// Resolved once per batch and shared read-only by every unit in it.
/// `api_key` is plaintext; the `Debug` impl redacts it and the struct is
/// deliberately not `Serialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub model_id: DbId,
    pub model_type: ModelType,
    pub api_key: String,
    pub base_url: String,
    pub provider_name: String,
    pub model_name: String,
}

impl ModelConfig {
    /// Provider name normalized for registry lookup.
    pub fn provider_key(&self) -> String {
        self.provider_name.trim().to_ascii_lowercase()
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model_id", &self.model_id)
            .field("model_type", &self.model_type)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}
