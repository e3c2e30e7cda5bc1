use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use storyreel_api::config::AppConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::state::AppState;
use storyreel_core::crypto::CredentialCipher;
use storyreel_db::store::{Persistence, PgStore};
use storyreel_pipeline::{ModelResolver, Orchestrator};
use storyreel_providers::http::build_client;
use storyreel_providers::ProviderRegistry;
use storyreel_storage::StoragePipeline;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "storyreel_api=debug,storyreel_pipeline=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // --- Configuration ---
    let config = AppConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        storage = ?config.storage,
        "Loaded configuration",
    );

    // --- Database ---
    let pool = storyreel_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    storyreel_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    storyreel_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");
    let store: Arc<dyn Persistence> = Arc::new(PgStore::new(pool));

    // --- Credentials ---
    let cipher = match config.encryption_key.as_deref() {
        Some(secret) => Some(Arc::new(
            CredentialCipher::from_secret(secret).context("Invalid ENCRYPTION_KEY")?,
        )),
        None => {
            tracing::warn!("ENCRYPTION_KEY is not set; stored provider credentials are used as-is");
            None
        }
    };

    // --- Providers and storage ---
    let client = build_client(
        config.orchestrator.provider_timeout,
        config.storage.proxy_url.as_deref(),
    )
    .context("Failed to build provider HTTP client")?;
    let providers = Arc::new(ProviderRegistry::with_defaults(client, config.orchestrator.poll));
    let storage = Arc::new(
        StoragePipeline::from_config(&config.storage).context("Failed to set up storage")?,
    );

    // --- Orchestrator ---
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        providers,
        storage,
        ModelResolver::new(cipher),
        config.orchestrator,
    ));
    tracing::info!(
        default_concurrency = config.orchestrator.default_concurrency,
        max_concurrency = config.orchestrator.max_concurrency,
        "Generation orchestrator started",
    );

    // --- Router ---
    let state = AppState {
        store,
        orchestrator: Arc::clone(&orchestrator),
        config: Arc::new(config.server.clone()),
    };
    let app = build_app_router(state, &config.server)?;

    // --- Start server ---
    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid HOST address")?,
        config.server.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping generation lanes");
    let report = orchestrator.shutdown(config.server.shutdown_timeout()).await;
    if report.clean {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            lanes_remaining = report.lanes_remaining,
            "Shutdown deadline passed with lanes still running",
        );
    }
    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Resolve on SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
