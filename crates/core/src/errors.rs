//! Error types shared by the survey sync crates.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for survey sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation rejected with a reason tag, surfaced to callers as `{"error": reason}`.
    #[error("Rejected: {0}")]
    Rejected(Rejection),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(Rejection::new(reason))
    }

    /// Payload handed back to the caller of a failed operation.
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            Self::Rejected(rejection) => serde_json::json!(rejection),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Non-success response from the CRM API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure after the retry budget was spent.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Session unavailable: {0}")]
    Session(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid date value '{0}'")]
    InvalidDate(String),

    #[error("Survey {0} is already synced and cannot be edited")]
    ReadOnlySurvey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Reason tag for a rejected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.error, message),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Well-known rejection reasons.
pub mod reasons {
    pub const NO_RECORD_TYPES: &str = "no_record_types";
    pub const NO_EDITABLE_FIELDS: &str = "no_editable_fields";
    pub const UPLOAD_FAILED: &str = "upload_failed";
    pub const COMPOSITE_FAILED: &str = "composite";
}
