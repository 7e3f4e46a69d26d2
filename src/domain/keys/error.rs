use super::model::KeyId;
use super::pool::KeyPoolError;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum KeyServiceError {
    #[error("key {0} not found")]
    NotFound(KeyId),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("key {0} is in use by a running job")]
    InUse(KeyId),
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<KeyPoolError> for KeyServiceError {
    fn from(err: KeyPoolError) -> Self {
        match err {
            KeyPoolError::NotFound(id) => KeyServiceError::NotFound(id),
            KeyPoolError::Reserved { key_id, .. } => KeyServiceError::InUse(key_id),
            err @ KeyPoolError::Duplicate(_) => KeyServiceError::Duplicate(err.to_string()),
        }
    }
}

impl From<AppError> for KeyServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => KeyServiceError::Invalid(msg),
            _ => KeyServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<KeyServiceError> for AppError {
    fn from(err: KeyServiceError) -> Self {
        match err {
            KeyServiceError::NotFound(id) => AppError::NotFound(format!("key {}", id)),
            KeyServiceError::Invalid(msg) => AppError::BadRequest(msg),
            KeyServiceError::Duplicate(msg) => AppError::Conflict(msg),
            KeyServiceError::InUse(id) => {
                AppError::Conflict(format!("key {} is in use by a running job", id))
            }
            KeyServiceError::Dependency(msg) => AppError::Internal(msg),
            KeyServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
