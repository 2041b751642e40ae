//! Error types for the CRM client crate.

use survey_sync_core::errors::{Error as CoreError, RemoteError};
use survey_sync_core::sync::{classify_http_status, SyncRetryClass};
use thiserror::Error;

/// Result type alias for CRM client operations.
pub type Result<T> = std::result::Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the REST API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Session values missing or unusable as headers
    #[error("Session error: {0}")]
    Session(String),
}

impl CrmError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(err)
                if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() =>
            {
                SyncRetryClass::Retryable
            }
            Self::Http(_) | Self::Json(_) | Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Session(_) => SyncRetryClass::ReauthRequired,
        }
    }
}

impl From<CrmError> for CoreError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Api { status, message } => RemoteError::Api { status, message }.into(),
            CrmError::Http(e) => RemoteError::Transport(e.to_string()).into(),
            CrmError::Json(e) => RemoteError::UnexpectedResponse(e.to_string()).into(),
            CrmError::InvalidRequest(message) => RemoteError::UnexpectedResponse(message).into(),
            CrmError::Session(message) => RemoteError::Session(message).into(),
        }
    }
}
