use std::sync::Arc;

use storyreel_db::store::Persistence;
use storyreel_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for ownership checks and health probes.
    pub store: Arc<dyn Persistence>,
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServerConfig>,
}
