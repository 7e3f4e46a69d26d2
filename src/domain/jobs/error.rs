use std::time::Duration;

use crate::domain::keys::KeyStatus;
use crate::error::AppError;

/// Failure of one chunk-synthesis call, or of a chunk as a whole once retries run out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid credentials: {0}")]
    KeyInvalid(String),
    #[error("key suspended: {0}")]
    KeySuspended(String),
    #[error("no credits: {0}")]
    KeyNoCredits(String),
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("no content generated: {0}")]
    NoContent(String),
    #[error("request rejected: {0}")]
    InvalidRequest(String),
    #[error("no key available: {0}")]
    NoKeyAvailable(String),
    #[error("gave up after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl SynthesisError {
    pub fn code(&self) -> &'static str {
        match self {
            SynthesisError::KeyInvalid(_) => "KEY_INVALID",
            SynthesisError::KeySuspended(_) => "KEY_SUSPENDED",
            SynthesisError::KeyNoCredits(_) => "KEY_NO_CREDITS",
            SynthesisError::RateLimited { .. } => "RATE_LIMITED",
            SynthesisError::Timeout(_) => "TIMEOUT",
            SynthesisError::Network(_) => "NETWORK_ERROR",
            SynthesisError::Server { .. } => "SERVER_ERROR",
            SynthesisError::NoContent(_) => "NO_CONTENT_GENERATED",
            SynthesisError::InvalidRequest(_) => "INVALID_REQUEST",
            SynthesisError::NoKeyAvailable(_) => "NO_KEY_AVAILABLE",
            SynthesisError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
        }
    }

    /// Status the offending key should take when this error is the key's fault.
    pub fn key_status(&self) -> Option<KeyStatus> {
        match self {
            SynthesisError::KeyInvalid(_) => Some(KeyStatus::Invalid),
            SynthesisError::KeySuspended(_) => Some(KeyStatus::Suspended),
            SynthesisError::KeyNoCredits(_) => Some(KeyStatus::NoCredits),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("job {0} not found")]
    NotFound(uuid::Uuid),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not ready: {0}")]
    NotReady(String),
    #[error("too large: {0}")]
    TooLarge(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<JobServiceError> for AppError {
    fn from(err: JobServiceError) -> Self {
        match err {
            JobServiceError::NotFound(id) => AppError::NotFound(format!("job {}", id)),
            JobServiceError::Invalid(msg) => AppError::BadRequest(msg),
            JobServiceError::Conflict(msg) | JobServiceError::NotReady(msg) => {
                AppError::Conflict(msg)
            }
            JobServiceError::TooLarge(msg) => AppError::PayloadTooLarge(msg),
            JobServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
