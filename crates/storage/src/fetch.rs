//! Fetching remote assets.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;
use crate::BROWSER_USER_AGENT;

/// An asset held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    /// `Content-Type` of the response, if it sent one.
    pub mime_type: Option<String>,
}

/// An asset written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub size: u64,
    pub mime_type: Option<String>,
}

/// Source of remote asset bytes. One call is one attempt; retries are
/// applied by the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, StorageError>;

    /// Stream `url` into a file at `dest`, replacing it if present.
    async fn download_to(&self, url: &str, dest: &Path) -> Result<Downloaded, StorageError>;
}

/// [`Fetcher`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, StorageError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                context: format!("download {}", redact_query(url)),
            });
        }
        Ok(response)
    }
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Drop the query string so signed URLs do not end up in logs.
pub fn redact_query(url: &str) -> &str {
    url.split(&['?', '#'][..]).next().unwrap_or(url)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, StorageError> {
        let response = self.get(url).await?;
        let mime_type = content_type(&response);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedBytes { bytes, mime_type })
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<Downloaded, StorageError> {
        let mut response = self.get(url).await?;
        let mime_type = content_type(&response);

        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut size = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(Downloaded { size, mime_type })
    }
}
