//! Provider Adapter Layer.
//!
//! Every external generation API is wrapped in a [`ProviderAdapter`] that
//! turns a [`GenerationRequest`] into a [`GenerationOutput`]. Synchronous
//! providers implement the trait directly; providers that accept a job and
//! report completion later implement [`polling::PollingClient`] and are
//! wrapped in [`polling::PollingAdapter`]. The [`registry::ProviderRegistry`]
//! maps `(media kind, provider name)` to an adapter.

pub mod adapter;
pub mod audio;
pub mod error;
pub mod http;
pub mod image;
pub mod polling;
pub mod registry;
pub mod runway;
pub mod video;

pub use adapter::{GeneratedAsset, GenerationOptions, GenerationOutput, GenerationRequest, ProviderAdapter};
pub use error::ProviderError;
pub use polling::{PollConfig, PollStatus, PollingAdapter, PollingClient};
pub use registry::ProviderRegistry;
