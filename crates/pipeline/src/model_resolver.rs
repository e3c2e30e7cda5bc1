//! Model Resolver: pick the generation model for a batch and open its
//! credential.

use std::sync::Arc;

use storyreel_core::crypto::CredentialCipher;
use storyreel_core::media::ModelType;
use storyreel_core::model::ModelConfig;
use storyreel_core::types::DbId;
use storyreel_db::models::ai_model::AiModel;
use storyreel_db::store::ModelStore;

use crate::error::GenerationError;

/// Resolves a [`ModelConfig`] from a project's preference.
#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    cipher: Option<Arc<CredentialCipher>>,
}

impl ModelResolver {
    /// Without a cipher, stored credentials are used as-is.
    pub fn new(cipher: Option<Arc<CredentialCipher>>) -> Self {
        Self { cipher }
    }

    /// Resolve the model for `model_type`.
    ///
    /// `preferred_id` is used when it names an active model of the right
    /// type; otherwise the first active model of that type is substituted.
    /// `credential` is the stored (normally encrypted) API key.
    pub async fn resolve<S: ModelStore + ?Sized>(
        &self,
        store: &S,
        model_type: ModelType,
        preferred_id: Option<DbId>,
        credential: Option<&str>,
    ) -> Result<ModelConfig, GenerationError> {
        let model = self.select_model(store, model_type, preferred_id).await?;

        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                GenerationError::Configuration(format!(
                    "No API key configured for {model_type} models"
                ))
            })?;
        let api_key = self.open_credential(model.id, credential);

        tracing::debug!(
            model_id = model.id,
            provider = %model.provider,
            model_name = %model.model_name,
            "Model resolved",
        );

        Ok(ModelConfig {
            model_id: model.id,
            model_type,
            api_key,
            base_url: model.base_url,
            provider_name: model.provider,
            model_name: model.model_name,
        })
    }

    async fn select_model<S: ModelStore + ?Sized>(
        &self,
        store: &S,
        model_type: ModelType,
        preferred_id: Option<DbId>,
    ) -> Result<AiModel, GenerationError> {
        if let Some(id) = preferred_id {
            match store.find_model(id).await? {
                Some(model) if model.serves(model_type) => return Ok(model),
                Some(model) => tracing::warn!(
                    preferred_id = id,
                    model_type = %model.model_type,
                    is_active = model.is_active,
                    "Preferred model unusable for {model_type}, substituting",
                ),
                None => tracing::warn!(
                    preferred_id = id,
                    "Preferred {model_type} model not found, substituting",
                ),
            }
        }

        let fallback = store
            .list_active_models(model_type)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GenerationError::Configuration(format!("No active {model_type} models found"))
            })?;

        if preferred_id.is_some() {
            tracing::warn!(model_id = fallback.id, "Using fallback {model_type} model");
        }
        Ok(fallback)
    }

    /// Decrypt the stored credential.
    ///
    /// A value that does not decrypt is used verbatim. Credentials saved
    /// before encryption was introduced are plaintext, so this keeps them
    /// working; it also means a corrupted ciphertext is sent to the
    /// provider as the key.
    fn open_credential(&self, model_id: DbId, stored: &str) -> String {
        let Some(cipher) = &self.cipher else {
            return stored.to_string();
        };
        match cipher.decrypt(stored) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::warn!(
                    model_id,
                    error = %e,
                    "Credential did not decrypt, using the stored value as the API key",
                );
                stored.to_string()
            }
        }
    }
}
