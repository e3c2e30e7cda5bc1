//! Start-then-poll providers.
//!
//! A [`PollingClient`] knows how to start a job and read its status once.
//! [`PollingAdapter`] owns the loop: it polls on a fixed interval until the
//! job succeeds, the provider reports failure, or the attempt budget runs
//! out. Transient poll failures are logged and retried on the next tick.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use storyreel_core::media::MediaKind;

use crate::adapter::{GenerationOutput, GenerationRequest, ProviderAdapter};
use crate::error::ProviderError;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks before giving up (10 minutes at 5s).
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

/// One status reading from the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Queued or running. `progress` is the provider's own 0.0-1.0 figure.
    Running { progress: Option<f64> },
    Succeeded { url: String },
    Failed { reason: String },
}

/// Provider-specific half of a poll-based adapter.
#[async_trait]
pub trait PollingClient: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> MediaKind;

    /// Submit the job and return the provider's job id.
    async fn start(&self, request: &GenerationRequest) -> Result<String, ProviderError>;

    async fn poll(&self, request: &GenerationRequest, job_id: &str) -> Result<PollStatus, ProviderError>;
}

/// Drives a [`PollingClient`] to completion.
pub struct PollingAdapter<C> {
    client: C,
    config: PollConfig,
}

impl<C: PollingClient> PollingAdapter<C> {
    pub fn new(client: C, config: PollConfig) -> Self {
        Self { client, config }
    }

    async fn wait_for(&self, request: &GenerationRequest, job_id: &str) -> Result<String, ProviderError> {
        let provider = self.client.name();
        for attempt in 1..=self.config.max_attempts {
            tokio::time::sleep(self.config.interval).await;

            match self.client.poll(request, job_id).await {
                Ok(PollStatus::Succeeded { url }) => {
                    tracing::info!(provider, job_id, attempt, "Provider job succeeded");
                    return Ok(url);
                }
                Ok(PollStatus::Failed { reason }) => {
                    tracing::warn!(provider, job_id, attempt, reason = %reason, "Provider job failed");
                    return Err(ProviderError::Rejected(reason));
                }
                Ok(PollStatus::Running { progress }) => {
                    tracing::debug!(provider, job_id, attempt, ?progress, "Provider job still running");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(provider, job_id, attempt, error = %e, "Status check failed, will retry");
                }
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::Timeout {
            attempts: self.config.max_attempts,
        })
    }
}

#[async_trait]
impl<C: PollingClient> ProviderAdapter for PollingAdapter<C> {
    fn name(&self) -> &'static str {
        self.client.name()
    }

    fn kind(&self) -> MediaKind {
        self.client.kind()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let job_id = self.client.start(request).await?;
        tracing::info!(provider = self.client.name(), job_id = %job_id, "Provider job started");
        let url = self.wait_for(request, &job_id).await?;
        Ok(GenerationOutput::url(url).with_metadata(json!({ "providerJobId": job_id })))
    }
}

impl<C> std::fmt::Debug for PollingAdapter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Extract the job id from a start response that carries `{ "id": ... }`.
pub fn job_id_from(body: &Value) -> Result<String, ProviderError> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProviderError::InvalidResponse("start response has no job id".into())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::adapter::{GeneratedAsset, GenerationOptions};

    /// Replays a scripted sequence of poll results.
    struct Scripted {
        start: Mutex<Option<Result<String, ProviderError>>>,
        polls: Mutex<VecDeque<Result<PollStatus, ProviderError>>>,
        poll_calls: AtomicU32,
    }

    impl Scripted {
        fn new(polls: Vec<Result<PollStatus, ProviderError>>) -> Self {
            Self {
                start: Mutex::new(Some(Ok("job-1".into()))),
                polls: Mutex::new(polls.into()),
                poll_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PollingClient for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn kind(&self) -> MediaKind {
            MediaKind::Video
        }

        async fn start(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
            self.start.lock().unwrap().take().unwrap()
        }

        async fn poll(&self, _request: &GenerationRequest, job_id: &str) -> Result<PollStatus, ProviderError> {
            assert_eq!(job_id, "job-1");
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(PollStatus::Running { progress: None }))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            base_url: "https://poll.example.com".into(),
            api_key: "k".into(),
            model_name: "gen3".into(),
            prompt: "p".into(),
            reference_urls: vec![],
            options: GenerationOptions::default(),
        }
    }

    fn running() -> Result<PollStatus, ProviderError> {
        Ok(PollStatus::Running { progress: Some(0.5) })
    }

    fn config(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(5),
            max_attempts,
        }
    }

    // -- Terminal states --

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_running_polls() {
        let adapter = PollingAdapter::new(
            Scripted::new(vec![
                running(),
                running(),
                running(),
                Ok(PollStatus::Succeeded { url: "https://cdn/out.mp4".into() }),
            ]),
            config(10),
        );

        let output = adapter.generate(&request()).await.unwrap();

        assert_eq!(output.asset, GeneratedAsset::Url("https://cdn/out.mp4".into()));
        assert_eq!(output.metadata["providerJobId"], "job-1");
        assert_eq!(adapter.client.poll_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_stops_immediately() {
        let adapter = PollingAdapter::new(
            Scripted::new(vec![running(), Ok(PollStatus::Failed { reason: "content policy".into() })]),
            config(10),
        );

        let err = adapter.generate(&request()).await.unwrap_err();

        assert_matches!(err, ProviderError::Rejected(reason) if reason == "content policy");
        assert_eq!(adapter.client.poll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_budget_is_a_timeout() {
        let adapter = PollingAdapter::new(Scripted::new(vec![]), config(3));

        let err = adapter.generate(&request()).await.unwrap_err();

        assert_matches!(err, ProviderError::Timeout { attempts: 3 });
        assert_eq!(adapter.client.poll_calls.load(Ordering::SeqCst), 3);
    }

    // -- Poll errors --

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_are_retried() {
        let adapter = PollingAdapter::new(
            Scripted::new(vec![
                Err(ProviderError::Api { status: 503, body: "busy".into() }),
                Ok(PollStatus::Succeeded { url: "https://cdn/x.mp4".into() }),
            ]),
            config(5),
        );

        assert!(adapter.generate(&request()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_poll_errors_propagate() {
        let adapter = PollingAdapter::new(
            Scripted::new(vec![Err(ProviderError::Api { status: 401, body: "bad key".into() })]),
            config(5),
        );

        assert_matches!(
            adapter.generate(&request()).await,
            Err(ProviderError::Api { status: 401, .. })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_skips_polling() {
        let client = Scripted::new(vec![]);
        *client.start.lock().unwrap() = Some(Err(ProviderError::Api { status: 400, body: "bad".into() }));
        let adapter = PollingAdapter::new(client, config(5));

        assert!(adapter.generate(&request()).await.is_err());
        assert_eq!(adapter.client.poll_calls.load(Ordering::SeqCst), 0);
    }

    // -- Helpers --

    #[test]
    fn job_id_accepts_strings_and_numbers() {
        assert_eq!(job_id_from(&json!({"id": "abc"})).unwrap(), "abc");
        assert_eq!(job_id_from(&json!({"id": 42})).unwrap(), "42");
        assert!(job_id_from(&json!({"id": ""})).is_err());
        assert!(job_id_from(&json!({})).is_err());
    }
}
