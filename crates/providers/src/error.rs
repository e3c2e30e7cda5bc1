//! Provider error type.

/// Errors from calling an external generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Unknown provider, unusable client settings, or a request the
    /// provider cannot serve. Never retried.
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider accepted the job and then reported it failed.
    #[error("Provider reported failure: {0}")]
    Rejected(String),

    /// A poll-based job did not finish within the attempt budget.
    #[error("Generation did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// A success response that does not carry a usable result.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// The URL is dropped so signed query strings never reach task records or
/// logs.
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Request(err.without_url())
    }
}

impl ProviderError {
    /// Whether the failure is a network condition worth trying again.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
