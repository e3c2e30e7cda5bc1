//! Storage error type and transient-failure classification.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Missing hosting credentials or unusable client settings. Never
    /// retried and never triggers a strategy fallback.
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("HTTP {status} from {context}")]
    Status { status: u16, context: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid hosting response: {0}")]
    InvalidResponse(String),
}

/// The URL is dropped so signed query strings never reach task records or
/// logs.
impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Request(err.without_url())
    }
}

impl StorageError {
    /// Connection resets, timeouts, DNS and connect failures, and gateway
    /// or throttling responses.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            StorageError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            StorageError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::Configuration(_))
    }
}
