//! Runway video generation (start/poll).
//!
//! `POST {base}/image_to_video` when reference media is supplied, otherwise
//! `POST {base}/text_to_video`; both answer `{ "id" }`. Status comes from
//! `GET {base}/tasks/{id}`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use storyreel_core::media::MediaKind;

use crate::adapter::GenerationRequest;
use crate::error::ProviderError;
use crate::http::{endpoint, merge_extra, parse_json};
use crate::polling::{job_id_from, PollStatus, PollingClient};

const DEFAULT_MODEL: &str = "gen3a_turbo";
const DEFAULT_RATIO: &str = "1280:768";
const API_VERSION_HEADER: &str = "X-Runway-Version";
const API_VERSION: &str = "2024-11-06";

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    failure: Option<String>,
    #[serde(default, rename = "failureCode")]
    failure_code: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RunwayClient {
    client: reqwest::Client,
}

impl RunwayClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn start_request(request: &GenerationRequest) -> (String, Value) {
        let model = Some(request.model_name.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL);
        let mut body = json!({
            "model": model,
            "promptText": request.prompt,
            "ratio": DEFAULT_RATIO,
        });
        if let Some(duration) = request.options.duration_secs {
            body["duration"] = json!(duration.round() as i64);
        }
        let path = match request.reference_urls.first() {
            Some(first) => {
                body["promptImage"] = json!(first);
                "image_to_video"
            }
            None => "text_to_video",
        };
        (
            endpoint(&request.base_url, path),
            merge_extra(body, &request.options.extra),
        )
    }

    /// Every Runway call carries the pinned API version.
    fn start_call(&self, request: &GenerationRequest) -> reqwest::RequestBuilder {
        let (url, body) = Self::start_request(request);
        self.client
            .post(url)
            .bearer_auth(&request.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&body)
    }
}

/// Map a task status body onto [`PollStatus`].
///
/// Unknown statuses are treated as still running so a new provider state
/// cannot end a job early; the attempt budget still bounds the wait.
fn interpret(task: TaskResponse) -> Result<PollStatus, ProviderError> {
    match task.status.to_ascii_uppercase().as_str() {
        "SUCCEEDED" => task
            .output
            .into_iter()
            .find(|u| !u.trim().is_empty())
            .map(|url| PollStatus::Succeeded { url })
            .ok_or_else(|| ProviderError::InvalidResponse("succeeded task has no output".into())),
        "FAILED" | "CANCELLED" => {
            let reason = task
                .failure
                .or(task.failure_code)
                .unwrap_or_else(|| format!("task {}", task.status.to_ascii_lowercase()));
            Ok(PollStatus::Failed { reason })
        }
        "PENDING" | "THROTTLED" | "RUNNING" => Ok(PollStatus::Running {
            progress: task.progress,
        }),
        other => {
            tracing::debug!(status = other, "Unrecognized Runway status, treating as running");
            Ok(PollStatus::Running {
                progress: task.progress,
            })
        }
    }
}

#[async_trait]
impl PollingClient for RunwayClient {
    fn name(&self) -> &'static str {
        "runway"
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn start(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let response = self.start_call(request).send().await?;
        let body: Value = parse_json(response).await?;
        job_id_from(&body)
    }

    async fn poll(&self, request: &GenerationRequest, job_id: &str) -> Result<PollStatus, ProviderError> {
        let url = endpoint(&request.base_url, &format!("tasks/{job_id}"));
        let response = self
            .client
            .get(url)
            .bearer_auth(&request.api_key)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await?;
        interpret(parse_json(response).await?)
    }
}
