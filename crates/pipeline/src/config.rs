//! Orchestrator settings.

use std::time::Duration;

use storyreel_core::scheduling::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use storyreel_providers::PollConfig;
use storyreel_storage::StorageMode;

/// Default request timeout for provider HTTP calls.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(180);

/// Default time `shutdown` waits for running lanes.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Chunk size used when a batch does not specify one.
    pub default_concurrency: usize,
    pub max_concurrency: usize,
    pub poll: PollConfig,
    pub provider_timeout: Duration,
    /// Storage strategy used when a batch does not specify one.
    pub default_storage_mode: StorageMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            max_concurrency: MAX_CONCURRENCY,
            poll: PollConfig::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            default_storage_mode: StorageMode::default(),
        }
    }
}
