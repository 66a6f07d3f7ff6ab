//! Error types for upstream calls.

use crate::redact::sanitize_reqwest_error;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Invalid backend configuration (bad base URL, zero timeout).
    #[error("config error: {0}")]
    Config(String),

    /// The backend answered with a non-2xx status.
    ///
    /// `body` is the decoded JSON error document when the backend sent one, otherwise the raw
    /// response text as a JSON string.
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    /// The backend could not be reached (connect refused, timeout, broken body stream).
    #[error("http transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// HTTP status for [`UpstreamError::Status`], `None` otherwise.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Config(_) | Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(sanitize_reqwest_error(&value))
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;
