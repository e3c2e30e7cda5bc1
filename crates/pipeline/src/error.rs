//! The generation error taxonomy.
//!
//! Lower-layer errors are classified on the way in. [`GenerationError::kind`]
//! is the stable code stored on failed tasks.

use serde::Serialize;
use serde_json::json;
use storyreel_core::error::CoreError;
use storyreel_core::types::DbId;
use storyreel_db::store::StoreError;
use storyreel_providers::ProviderError;
use storyreel_storage::StorageError;

/// A character whose reference media could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingReference {
    pub id: DbId,
    pub name: String,
    /// Whether a matching character record exists but has no media of the
    /// requested kind.
    pub found: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Missing or unusable model, credential, provider or executor state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// The provider reported a failure. The message is the provider's own.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Missing reference media for {}", describe_missing(.characters))]
    ReferenceMissing { characters: Vec<MissingReference> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

fn describe_missing(characters: &[MissingReference]) -> String {
    characters
        .iter()
        .map(|c| format!("{} (#{})", c.name, c.id))
        .collect::<Vec<_>>()
        .join(", ")
}

impl GenerationError {
    /// Stable classification code.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Configuration(_) => "configuration",
            GenerationError::Validation(_) => "validation",
            GenerationError::NotFound { .. } => "not_found",
            GenerationError::TransientNetwork(_) => "transient_network",
            GenerationError::Provider(_) => "provider",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::ReferenceMissing { .. } => "reference_missing",
            GenerationError::Storage(_) => "storage",
            GenerationError::Persistence(_) => "persistence",
        }
    }

    /// Metadata merged into a task record when it fails with this error.
    pub fn failure_metadata(&self) -> serde_json::Value {
        match self {
            GenerationError::ReferenceMissing { characters } => json!({
                "errorKind": self.kind(),
                "missingCharacters": characters,
            }),
            _ => json!({ "errorKind": self.kind() }),
        }
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(msg) => GenerationError::Configuration(msg),
            ProviderError::Timeout { .. } => GenerationError::Timeout(err.to_string()),
            ProviderError::Rejected(reason) => GenerationError::Provider(reason),
            e if e.is_transient() => GenerationError::TransientNetwork(e.to_string()),
            e => GenerationError::Provider(e.to_string()),
        }
    }
}

impl From<StorageError> for GenerationError {
    fn from(err: StorageError) -> Self {
        if err.is_configuration() {
            GenerationError::Configuration(err.to_string())
        } else if err.is_transient() {
            GenerationError::TransientNetwork(err.to_string())
        } else {
            GenerationError::Storage(err.to_string())
        }
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity, id } => GenerationError::NotFound { entity, id },
            CoreError::Validation(msg) | CoreError::Unauthorized(msg) => {
                GenerationError::Validation(msg)
            }
            CoreError::Configuration(msg) | CoreError::Internal(msg) => {
                GenerationError::Configuration(msg)
            }
        }
    }
}
