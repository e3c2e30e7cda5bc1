//! Permanent hosting backends.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::StorageError;
use crate::BROWSER_USER_AGENT;

/// Uploads a file and returns its permanent public URL. One call is one
/// attempt; retries are applied by the caller.
#[async_trait]
pub trait MediaHost: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, StorageError>;

    async fn upload_file(&self, path: &Path, filename: &str, mime_type: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(bytes, filename, mime_type).await
    }
}

/// Catbox user API (`reqtype=fileupload`).
pub struct CatboxHost {
    client: reqwest::Client,
    api_url: String,
    user_hash: Option<String>,
}

impl CatboxHost {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, user_hash: Option<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            user_hash: user_hash.filter(|h| !h.trim().is_empty()),
        }
    }

    fn user_hash(&self) -> Result<&str, StorageError> {
        self.user_hash
            .as_deref()
            .ok_or_else(|| StorageError::Configuration("CATBOX_USER_HASH is not configured".into()))
    }
}

impl std::fmt::Debug for CatboxHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatboxHost")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// A successful upload answers with the file URL as plain text.
pub fn parse_upload_response(body: &str) -> Result<String, StorageError> {
    let body = body.trim();
    if body.starts_with("http") {
        Ok(body.to_string())
    } else {
        let preview: String = body.chars().take(200).collect();
        Err(StorageError::InvalidResponse(format!(
            "expected a URL, got: {preview}"
        )))
    }
}

#[async_trait]
impl MediaHost for CatboxHost {
    fn name(&self) -> &'static str {
        "catbox"
    }

    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let user_hash = self.user_hash()?;
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new()
            .text("reqtype", "fileupload")
            .text("userhash", user_hash.to_string())
            .part("fileToUpload", part);

        let response = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::ORIGIN, "https://catbox.moe")
            .header(reqwest::header::REFERER, "https://catbox.moe/")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                context: "catbox upload".into(),
            });
        }
        let url = parse_upload_response(&response.text().await?)?;
        tracing::info!(host = "catbox", url = %url, "File uploaded");
        Ok(url)
    }
}
