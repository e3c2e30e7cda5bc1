//! Provider lookup by media kind and provider name.

use std::collections::HashMap;
use std::sync::Arc;

use storyreel_core::media::MediaKind;

use crate::adapter::ProviderAdapter;
use crate::audio::{DoubaoSpeech, OpenAiSpeech};
use crate::error::ProviderError;
use crate::image::{GrsaiImage, OpenAiImage, StabilityImage};
use crate::polling::{PollConfig, PollingAdapter};
use crate::runway::RunwayClient;
use crate::video::{GrsaiVideo, OpenAiVideo};

type Key = (MediaKind, String);

/// Table of adapters keyed by `(kind, lowercase provider name)`.
///
/// New providers are added with [`ProviderRegistry::register`]; callers
/// never branch on provider names themselves.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    adapters: HashMap<Key, Arc<dyn ProviderAdapter>>,
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider, sharing one HTTP client.
    pub fn with_defaults(client: reqwest::Client, poll: PollConfig) -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(OpenAiVideo::new(client.clone())))
            .register(Arc::new(GrsaiVideo::new(client.clone())))
            .register(Arc::new(PollingAdapter::new(RunwayClient::new(client.clone()), poll)))
            .register(Arc::new(OpenAiImage::new(client.clone())))
            .register(Arc::new(GrsaiImage::new(client.clone())))
            .register(Arc::new(StabilityImage::new(client.clone())))
            .register(Arc::new(OpenAiSpeech::new(client.clone())))
            .register(Arc::new(DoubaoSpeech::new(client)));
        registry
            .alias(MediaKind::Image, "stability-ai", "stability")
            .alias(MediaKind::Audio, "volcengine", "doubao");
        registry
    }

    /// Register an adapter under its own name and kind, replacing any
    /// previous entry.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        self.adapters
            .insert((adapter.kind(), normalize(adapter.name())), adapter);
        self
    }

    /// Make `alias` resolve to the adapter registered as `target`. A missing
    /// target is ignored.
    pub fn alias(&mut self, kind: MediaKind, alias: &str, target: &str) -> &mut Self {
        if let Some(adapter) = self.adapters.get(&(kind, normalize(target))).cloned() {
            self.adapters.insert((kind, normalize(alias)), adapter);
        }
        self
    }

    /// Look up the adapter for a provider. An unknown provider is a
    /// configuration error.
    pub fn resolve(&self, kind: MediaKind, provider_name: &str) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
        self.adapters
            .get(&(kind, normalize(provider_name)))
            .cloned()
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "Unsupported {kind} provider: {}",
                    provider_name.trim()
                ))
            })
    }

    /// Registered provider names for a kind, sorted.
    pub fn providers_for(&self, kind: MediaKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .adapters
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .adapters
            .keys()
            .map(|(kind, name)| format!("{kind}/{name}"))
            .collect();
        keys.sort();
        f.debug_struct("ProviderRegistry").field("adapters", &keys).finish()
    }
}
