use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("invalid limit {0}: must be between 1 and 1000")]
    InvalidLimit(i64),

    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("invalid filter value: {0}")]
    InvalidFilter(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("resource {id} is no longer available on disk")]
    Gone { id: i64 },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SearchError {
    /// Short human-readable text used in notifications.
    ///
    /// Status errors surface the reason phrase the way a browser's
    /// `statusText` does; everything else uses the display form.
    pub fn status_text(&self) -> String {
        match self {
            SearchError::Status { status, reason } if reason.is_empty() => status.to_string(),
            SearchError::Status { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
