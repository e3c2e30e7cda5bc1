//! The two publish strategies and the fallback between them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storyreel_core::media::{is_remote_url, mime_from_extension, DEFAULT_MIME_TYPE};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::fetch::{redact_query, Fetcher, HttpFetcher};
use crate::host::{CatboxHost, MediaHost};
use crate::layout::StorageTarget;
use crate::retry::RetryPolicy;

/// How a remote asset reaches the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Download to local storage, then upload the file.
    #[default]
    Download,
    /// Fetch into memory and upload the buffer; no local file.
    Buffer,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Download => "download",
            StorageMode::Buffer => "buffer",
        }
    }
}

/// Outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResult {
    /// Path relative to the storage base; `None` when nothing was written locally.
    pub local_path: Option<String>,
    pub public_url: String,
    pub size: u64,
    pub mime_type: String,
}

/// Publishes generated assets to permanent hosting.
pub struct StoragePipeline {
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn MediaHost>,
    base_path: PathBuf,
    retry: RetryPolicy,
}

impl StoragePipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn MediaHost>,
        base_path: impl Into<PathBuf>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            host,
            base_path: base_path.into(),
            retry,
        }
    }

    /// Build the HTTP fetcher and Catbox host from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let download_client = http_client(config.download_timeout, config.proxy_url.as_deref())?;
        let upload_client = http_client(config.upload_timeout, config.proxy_url.as_deref())?;
        Ok(Self::new(
            Arc::new(HttpFetcher::new(download_client)),
            Arc::new(CatboxHost::new(
                upload_client,
                config.catbox_api_url.clone(),
                config.catbox_user_hash.clone(),
            )),
            config.base_path.clone(),
            config.retry,
        ))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Publish the asset at `url`.
    ///
    /// In [`StorageMode::Buffer`], any failure other than a configuration
    /// error falls back to [`StorageMode::Download`] before surfacing.
    pub async fn publish(
        &self,
        url: &str,
        mode: StorageMode,
        target: &StorageTarget,
    ) -> Result<StorageResult, StorageError> {
        if !is_remote_url(url) {
            return Err(StorageError::InvalidUrl(format!(
                "only http and https sources are supported: {}",
                redact_query(url)
            )));
        }

        match mode {
            StorageMode::Download => self.download_then_host(url, target).await,
            StorageMode::Buffer => match self.buffer_then_host(url, target).await {
                Ok(result) => Ok(result),
                Err(e) if e.is_configuration() => Err(e),
                Err(e) => {
                    tracing::warn!(
                        source = redact_query(url),
                        error = %e,
                        "Buffer publish failed, falling back to download",
                    );
                    self.download_then_host(url, target).await
                }
            },
        }
    }

    /// Publish bytes a provider returned inline: write them locally, then
    /// upload the file.
    pub async fn publish_inline(
        &self,
        bytes: &[u8],
        mime_type: &str,
        target: &StorageTarget,
    ) -> Result<StorageResult, StorageError> {
        let dest = target.absolute_path(&self.base_path);
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&dest, bytes).await?;

        let mime_type = resolve_mime(Some(mime_type.to_string()), &target.filename);
        let public_url = self.upload_file(&dest, &target.filename, &mime_type).await?;

        tracing::info!(path = %target.relative_path(), url = %public_url, "Inline asset published");
        Ok(StorageResult {
            local_path: Some(target.relative_path()),
            public_url,
            size: bytes.len() as u64,
            mime_type,
        })
    }

    async fn download_then_host(
        &self,
        url: &str,
        target: &StorageTarget,
    ) -> Result<StorageResult, StorageError> {
        let dest_buf = target.absolute_path(&self.base_path);
        let dest = dest_buf.as_path();
        let fetcher = &self.fetcher;

        let downloaded = self
            .retry
            .run("download", move || fetcher.download_to(url, dest))
            .await?;
        tracing::info!(
            source = redact_query(url),
            path = %target.relative_path(),
            size = downloaded.size,
            "Asset downloaded",
        );

        let mime_type = resolve_mime(downloaded.mime_type, &target.filename);
        let public_url = self.upload_file(dest, &target.filename, &mime_type).await?;

        Ok(StorageResult {
            local_path: Some(target.relative_path()),
            public_url,
            size: downloaded.size,
            mime_type,
        })
    }

    async fn buffer_then_host(
        &self,
        url: &str,
        target: &StorageTarget,
    ) -> Result<StorageResult, StorageError> {
        let fetcher = &self.fetcher;
        let fetched = self
            .retry
            .run("fetch", move || fetcher.fetch_bytes(url))
            .await?;

        let size = fetched.bytes.len() as u64;
        let mime_type = resolve_mime(fetched.mime_type, &target.filename);
        let bytes = fetched.bytes;
        let host = &self.host;
        let filename = target.filename.as_str();
        let mime = mime_type.as_str();
        let public_url = self
            .retry
            .run("upload", move || host.upload_bytes(bytes.clone(), filename, mime))
            .await?;

        tracing::info!(source = redact_query(url), url = %public_url, size, "Asset published from buffer");
        Ok(StorageResult {
            local_path: None,
            public_url,
            size,
            mime_type,
        })
    }

    async fn upload_file(&self, path: &Path, filename: &str, mime_type: &str) -> Result<String, StorageError> {
        let host = &self.host;
        self.retry
            .run("upload", move || host.upload_file(path, filename, mime_type))
            .await
    }
}

fn http_client(timeout: std::time::Duration, proxy: Option<&str>) -> Result<reqwest::Client, StorageError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| StorageError::Configuration(format!("Invalid proxy URL: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| StorageError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Reported content type, else a guess from the filename, else
/// `application/octet-stream`.
fn resolve_mime(reported: Option<String>, filename: &str) -> String {
    reported
        .filter(|m| !m.is_empty() && m != DEFAULT_MIME_TYPE)
        .or_else(|| mime_from_extension(filename).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::fetch::{Downloaded, FetchedBytes};

    const CONTENT: &[u8] = b"fake-mp4-bytes";

    #[derive(Default)]
    struct FakeFetcher {
        /// Number of `fetch_bytes` calls that fail with a connection reset.
        failing_fetches: AtomicU32,
        fetch_calls: AtomicU32,
        download_calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch_bytes(&self, _url: &str) -> Result<FetchedBytes, StorageError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failing_fetches.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_fetches.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));
            }
            Ok(FetchedBytes {
                bytes: CONTENT.to_vec(),
                mime_type: Some("video/mp4".into()),
            })
        }

        async fn download_to(&self, _url: &str, dest: &Path) -> Result<Downloaded, StorageError> {
            self.download_calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::create_dir_all(dest.parent().unwrap()).await?;
            tokio::fs::write(dest, CONTENT).await?;
            Ok(Downloaded {
                size: CONTENT.len() as u64,
                mime_type: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeHost {
        uploads: Mutex<Vec<(String, usize, String)>>,
        unconfigured: bool,
    }

    #[async_trait]
    impl MediaHost for FakeHost {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn upload_bytes(&self, bytes: Vec<u8>, filename: &str, mime_type: &str) -> Result<String, StorageError> {
            if self.unconfigured {
                return Err(StorageError::Configuration("no user hash".into()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((filename.to_string(), bytes.len(), mime_type.to_string()));
            Ok(format!("https://host.example/{filename}"))
        }
    }

    fn pipeline(fetcher: Arc<FakeFetcher>, host: Arc<FakeHost>, base: &Path) -> StoragePipeline {
        StoragePipeline::new(fetcher, host, base, RetryPolicy::default())
    }

    // -- Download strategy --

    #[tokio::test]
    async fn download_mode_keeps_a_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let host = Arc::new(FakeHost::default());
        let target = StorageTarget::shot(5, 100);

        let result = pipeline(fetcher.clone(), host.clone(), dir.path())
            .publish("https://cdn.example/out.mp4", StorageMode::Download, &target)
            .await
            .unwrap();

        assert_eq!(result.local_path.as_deref(), Some("videos/5/shot_5_100.mp4"));
        assert_eq!(result.public_url, "https://host.example/shot_5_100.mp4");
        assert_eq!(result.size, CONTENT.len() as u64);
        assert_eq!(result.mime_type, "video/mp4");
        assert!(dir.path().join("videos/5/shot_5_100.mp4").exists());
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 0);
    }

    // -- Buffer strategy --

    #[tokio::test]
    async fn buffer_mode_writes_nothing_locally() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let host = Arc::new(FakeHost::default());

        let result = pipeline(fetcher.clone(), host.clone(), dir.path())
            .publish("https://cdn.example/out.mp4", StorageMode::Buffer, &StorageTarget::shot(5, 1))
            .await
            .unwrap();

        assert_eq!(result.local_path, None);
        assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);
        assert_eq!(host.uploads.lock().unwrap().len(), 1);
        assert!(!dir.path().join("videos").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_retries_then_falls_back_to_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.failing_fetches.store(u32::MAX, Ordering::SeqCst);
        let host = Arc::new(FakeHost::default());

        let result = pipeline(fetcher.clone(), host.clone(), dir.path())
            .publish("https://cdn.example/out.mp4", StorageMode::Buffer, &StorageTarget::merged(3, 9))
            .await
            .unwrap();

        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.local_path.as_deref(), Some("videos/3/merged_3_9.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_recovers_within_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.failing_fetches.store(1, Ordering::SeqCst);

        let result = pipeline(fetcher.clone(), Arc::new(FakeHost::default()), dir.path())
            .publish("https://cdn.example/out.mp4", StorageMode::Buffer, &StorageTarget::shot(1, 1))
            .await
            .unwrap();

        assert_eq!(result.local_path, None);
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn configuration_errors_skip_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let host = Arc::new(FakeHost {
            unconfigured: true,
            ..Default::default()
        });

        let err = pipeline(fetcher.clone(), host, dir.path())
            .publish("https://cdn.example/out.mp4", StorageMode::Buffer, &StorageTarget::shot(1, 1))
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);
    }

    // -- Validation --

    #[tokio::test]
    async fn non_http_sources_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());

        let err = pipeline(fetcher.clone(), Arc::new(FakeHost::default()), dir.path())
            .publish("file:///etc/passwd", StorageMode::Download, &StorageTarget::shot(1, 1))
            .await
            .unwrap_err();

        assert_matches!(err, StorageError::InvalidUrl(_));
        assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);
    }

    // -- Inline assets --

    #[tokio::test]
    async fn inline_bytes_are_written_then_uploaded() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(FakeHost::default());
        let target = StorageTarget::dialogue(8, 42);

        let result = pipeline(Arc::new(FakeFetcher::default()), host.clone(), dir.path())
            .publish_inline(b"ID3audio", "audio/mpeg", &target)
            .await
            .unwrap();

        assert_eq!(result.local_path.as_deref(), Some("audio/8/dialogue_8_42.mp3"));
        assert_eq!(result.size, 8);
        assert_eq!(result.mime_type, "audio/mpeg");
        let written = std::fs::read(dir.path().join("audio/8/dialogue_8_42.mp3")).unwrap();
        assert_eq!(written, b"ID3audio");
        assert_eq!(host.uploads.lock().unwrap()[0].0, "dialogue_8_42.mp3");
    }

    // -- MIME resolution --

    #[test]
    fn mime_prefers_response_then_extension() {
        assert_eq!(resolve_mime(Some("image/webp".into()), "a.png"), "image/webp");
        assert_eq!(resolve_mime(None, "a.png"), "image/png");
        assert_eq!(resolve_mime(Some(DEFAULT_MIME_TYPE.into()), "a.mp4"), "video/mp4");
        assert_eq!(resolve_mime(None, "blob"), DEFAULT_MIME_TYPE);
    }
}
