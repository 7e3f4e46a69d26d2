pub mod dto;
pub mod error;
pub mod model;
pub mod pool;
pub mod quota;
pub mod service;

pub use dto::{AddKeysRequest, KeyStatusView, NewKey, ResetAllResponse, UpdateKeyRequest, ValidationResponse};
pub use error::KeyServiceError;
pub use model::{ApiKey, KeyId, KeyStatus, ModelLimits};
pub use pool::{CallOutcome, KeyAvailability, KeyLease, KeyPool, KeyPoolError};
pub use quota::QuotaTracker;
pub use service::{KeyService, KeyServiceApi};
