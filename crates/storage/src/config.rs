//! Storage settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_STORAGE_BASE_PATH: &str = "./storage";
pub const DEFAULT_CATBOX_API_URL: &str = "https://catbox.moe/user/api.php";
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct StorageConfig {
    /// Root directory for downloaded and inline assets.
    pub base_path: PathBuf,
    pub catbox_api_url: String,
    pub catbox_user_hash: Option<String>,
    /// Optional HTTP proxy for downloads and uploads.
    pub proxy_url: Option<String>,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_STORAGE_BASE_PATH),
            catbox_api_url: DEFAULT_CATBOX_API_URL.to_string(),
            catbox_user_hash: None,
            proxy_url: None,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("base_path", &self.base_path)
            .field("catbox_api_url", &self.catbox_api_url)
            .field("catbox_user_hash", &self.catbox_user_hash.as_ref().map(|_| "<redacted>"))
            .field("proxy_url", &self.proxy_url)
            .field("download_timeout", &self.download_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
