//! Shared HTTP helpers for provider clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Error bodies longer than this are truncated before they reach logs or
/// task records.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Build a client with a request timeout and an optional proxy.
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| ProviderError::Configuration(format!("Invalid proxy URL: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {e}")))
}

/// Join a base URL and a path with exactly one slash between them.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `POST` a JSON body with bearer authentication.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Value,
) -> Result<reqwest::Response, ProviderError> {
    Ok(client.post(url).bearer_auth(api_key).json(body).send().await?)
}

/// Return the response unchanged on 2xx, otherwise an [`ProviderError::Api`]
/// carrying the status and a truncated body.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: truncate(&body),
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body.
pub async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Read a successful binary response body and its content type.
pub async fn read_bytes(
    response: reqwest::Response,
    fallback_mime: &str,
) -> Result<(Vec<u8>, String), ProviderError> {
    let response = ensure_success(response).await?;
    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback_mime.to_string());
    let bytes = response.bytes().await?.to_vec();
    if bytes.is_empty() {
        return Err(ProviderError::InvalidResponse("empty response body".into()));
    }
    Ok((bytes, mime_type))
}

/// First non-empty string found at any of the JSON pointers, in order.
pub fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Merge provider-specific parameters into a JSON object body. Extra keys
/// win over the ones already present.
pub fn merge_extra(mut body: Value, extra: &Map<String, Value>) -> Value {
    if let Value::Object(map) = &mut body {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
    body
}

pub fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_normalizes_slashes() {
        assert_eq!(endpoint("https://a/v1/", "/images/generations"), "https://a/v1/images/generations");
        assert_eq!(endpoint("https://a/v1", "tts"), "https://a/v1/tts");
    }

    #[test]
    fn first_string_tries_pointers_in_order() {
        let body = json!({"videoUrl": "", "data": {"url": "https://cdn/x.mp4"}, "url": "https://other"});
        assert_eq!(
            first_string(&body, &["/videoUrl", "/data/url", "/url"]).as_deref(),
            Some("https://cdn/x.mp4")
        );
        assert_eq!(first_string(&json!({}), &["/url"]), None);
    }

    #[test]
    fn extra_parameters_override_defaults() {
        let mut extra = Map::new();
        extra.insert("duration".into(), json!(10));
        extra.insert("aspect_ratio".into(), json!("9:16"));
        let merged = merge_extra(json!({"prompt": "p", "duration": 2}), &extra);
        assert_eq!(merged, json!({"prompt": "p", "duration": 10, "aspect_ratio": "9:16"}));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 20);
        let cut = truncate(&body);
        assert_eq!(cut.len(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn invalid_proxy_is_a_configuration_error() {
        let err = build_client(Duration::from_secs(1), Some("::not a url::")).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
