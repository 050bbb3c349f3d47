//! Error types for fetching constraint data.

use thiserror::Error;

/// Errors that can occur when fetching constraint records.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The client is misconfigured (missing API key, unusable endpoint).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the API key.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connection to the provider failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("HTTP request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Schema(String),
}

impl FetchError {
    /// Whether the failure may clear up on its own and is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Connection(_) | FetchError::Timeout => true,
            FetchError::Http { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Whether an operator has to intervene before fetching can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Configuration(_) | FetchError::Authentication(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else if err.is_decode() {
            FetchError::Schema(err.to_string())
        } else if err.is_builder() {
            FetchError::Configuration(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FetchError::Connection(err.to_string())
        }
    }
}
