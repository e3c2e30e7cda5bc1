//! Process configuration loaded from environment variables.
//!
//! Every section is read through [`AppConfig::from_env`]. Loaders never
//! panic: a malformed value produces a [`ConfigError`] naming the variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use storyreel_pipeline::OrchestratorConfig;
use storyreel_providers::PollConfig;
use storyreel_storage::config::{
    DEFAULT_CATBOX_API_URL, DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_STORAGE_BASE_PATH,
    DEFAULT_UPLOAD_TIMEOUT,
};
use storyreel_storage::{RetryPolicy, StorageConfig, StorageMode};

use crate::auth::jwt::JwtConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Variable access
// ---------------------------------------------------------------------------

/// Typed access to a variable source. Empty values count as unset.
pub(crate) struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub(crate) fn new(lookup: F) -> Self {
        Self(lookup)
    }

    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.string(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.string(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name,
                expected: std::any::type_name::<T>(),
                value,
            }),
        }
    }

    fn secs_or(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse_or(name, default.as_secs()).map(Duration::from_secs)
    }
}

fn at_least_one(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            expected: "positive integer",
            value: value.to_string(),
        });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running generation lanes (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `JWT_SECRET`            | required                |
    fn load<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Self, ConfigError> {
        let cors_origins = vars
            .string_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: vars.string_or("HOST", "0.0.0.0"),
            port: vars.parse_or("PORT", 3000u16)?,
            cors_origins,
            request_timeout_secs: vars.parse_or("REQUEST_TIMEOUT_SECS", 30u64)?,
            shutdown_timeout_secs: vars.parse_or("SHUTDOWN_TIMEOUT_SECS", 30u64)?,
            jwt: JwtConfig::load(vars)?,
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl JwtConfig {
    /// | Env Var                  | Default  |
    /// |--------------------------|----------|
    /// | `JWT_SECRET`             | required |
    /// | `JWT_ACCESS_EXPIRY_MINS` | `60`     |
    pub(crate) fn load<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<Self, ConfigError> {
        Ok(Self {
            secret: vars.required("JWT_SECRET")?,
            access_token_expiry_mins: vars.parse_or(
                "JWT_ACCESS_EXPIRY_MINS",
                crate::auth::jwt::DEFAULT_ACCESS_EXPIRY_MINS,
            )?,
        })
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// | Env Var                    | Default                          |
/// |----------------------------|----------------------------------|
/// | `STORAGE_BASE_PATH`        | `./storage`                      |
/// | `CATBOX_API_URL`           | `https://catbox.moe/user/api.php`|
/// | `CATBOX_USER_HASH`         | unset                            |
/// | `PROXY_URL`                | unset                            |
/// | `DOWNLOAD_TIMEOUT_SECS`    | `30`                             |
/// | `UPLOAD_TIMEOUT_SECS`      | `60`                             |
/// | `STORAGE_RETRY_ATTEMPTS`   | `3`                              |
/// | `STORAGE_RETRY_INITIAL_MS` | `1000`                           |
fn load_storage<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<StorageConfig, ConfigError> {
    let defaults = RetryPolicy::default();
    let attempts = at_least_one(
        "STORAGE_RETRY_ATTEMPTS",
        vars.parse_or("STORAGE_RETRY_ATTEMPTS", u64::from(defaults.max_attempts))?,
    )?;
    let max_attempts = u32::try_from(attempts).map_err(|_| ConfigError::Invalid {
        name: "STORAGE_RETRY_ATTEMPTS",
        expected: "u32",
        value: attempts.to_string(),
    })?;
    let initial_ms: u64 = vars.parse_or(
        "STORAGE_RETRY_INITIAL_MS",
        defaults.initial_delay.as_millis() as u64,
    )?;

    Ok(StorageConfig {
        base_path: PathBuf::from(vars.string_or("STORAGE_BASE_PATH", DEFAULT_STORAGE_BASE_PATH)),
        catbox_api_url: vars.string_or("CATBOX_API_URL", DEFAULT_CATBOX_API_URL),
        catbox_user_hash: vars.string("CATBOX_USER_HASH"),
        proxy_url: vars.string("PROXY_URL"),
        download_timeout: vars.secs_or("DOWNLOAD_TIMEOUT_SECS", DEFAULT_DOWNLOAD_TIMEOUT)?,
        upload_timeout: vars.secs_or("UPLOAD_TIMEOUT_SECS", DEFAULT_UPLOAD_TIMEOUT)?,
        retry: RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            ..defaults
        },
    })
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// | Env Var                      | Default    |
/// |------------------------------|------------|
/// | `GENERATION_CONCURRENCY`     | `3`        |
/// | `GENERATION_MAX_CONCURRENCY` | `20`       |
/// | `GENERATION_STORAGE_MODE`    | `download` |
/// | `POLL_INTERVAL_SECS`         | `5`        |
/// | `POLL_MAX_ATTEMPTS`          | `120`      |
/// | `PROVIDER_TIMEOUT_SECS`      | `180`      |
fn load_orchestrator<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<OrchestratorConfig, ConfigError> {
    let defaults = OrchestratorConfig::default();

    let max_concurrency: usize =
        vars.parse_or("GENERATION_MAX_CONCURRENCY", defaults.max_concurrency)?;
    at_least_one("GENERATION_MAX_CONCURRENCY", max_concurrency as u64)?;

    let default_concurrency: usize =
        vars.parse_or("GENERATION_CONCURRENCY", defaults.default_concurrency)?;
    if default_concurrency == 0 || default_concurrency > max_concurrency {
        return Err(ConfigError::Invalid {
            name: "GENERATION_CONCURRENCY",
            expected: "integer between 1 and GENERATION_MAX_CONCURRENCY",
            value: default_concurrency.to_string(),
        });
    }

    let default_storage_mode = match vars.string("GENERATION_STORAGE_MODE").as_deref() {
        None => defaults.default_storage_mode,
        Some("download") => StorageMode::Download,
        Some("buffer") => StorageMode::Buffer,
        Some(other) => {
            return Err(ConfigError::Invalid {
                name: "GENERATION_STORAGE_MODE",
                expected: "storage mode (download or buffer)",
                value: other.to_string(),
            })
        }
    };

    let max_attempts = vars.parse_or("POLL_MAX_ATTEMPTS", defaults.poll.max_attempts)?;
    at_least_one("POLL_MAX_ATTEMPTS", u64::from(max_attempts))?;

    Ok(OrchestratorConfig {
        default_concurrency,
        max_concurrency,
        poll: PollConfig {
            interval: vars.secs_or("POLL_INTERVAL_SECS", defaults.poll.interval)?,
            max_attempts,
        },
        provider_timeout: vars.secs_or("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout)?,
        default_storage_mode,
    })
}

// ---------------------------------------------------------------------------
// Whole process
// ---------------------------------------------------------------------------

/// Everything the binary needs to start.
#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub orchestrator: OrchestratorConfig,
    pub database_url: String,
    /// Secret for the credential cipher. Without it stored credentials are
    /// used as-is.
    pub encryption_key: Option<String>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let vars = Vars::new(lookup);
        Ok(Self {
            server: ServerConfig::load(&vars)?,
            storage: load_storage(&vars)?,
            orchestrator: load_orchestrator(&vars)?,
            database_url: vars.required("DATABASE_URL")?,
            encryption_key: vars.string("ENCRYPTION_KEY"),
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("storage", &self.storage)
            .field("orchestrator", &self.orchestrator)
            .field("database_url", &"<redacted>")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
