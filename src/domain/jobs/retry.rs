use std::time::Duration;

use super::error::SynthesisError;
use crate::domain::keys::KeyStatus;

/// Cooldown applied to a key the provider rate-limited without saying for how long.
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// What to do after a failed chunk attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// The key is at fault: demote it and retry on another key without spending budget.
    Failover { demote_to: KeyStatus },
    /// The provider throttled this key: park it for `cooldown` and retry on another key.
    RetryOtherKey { cooldown: Duration },
    /// Transient failure: retry on the same key, after `delay` when the provider asked for one.
    RetrySameKey { delay: Option<Duration> },
    /// Stop the chunk and fail the job.
    Fail(SynthesisError),
}

/// Classifies failures and enforces the per-chunk attempt budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    max_attempts: u32,
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `failed_attempts` counts budget-consuming failures already recorded for the chunk,
    /// not including `error`.
    pub fn decide(&self, error: &SynthesisError, failed_attempts: u32) -> RetryDecision {
        if let Some(status) = error.key_status() {
            return RetryDecision::Failover { demote_to: status };
        }

        let retry = match error {
            SynthesisError::RateLimited { retry_after, .. } => RetryDecision::RetryOtherKey {
                cooldown: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN),
            },
            SynthesisError::Server { retry_after, .. } => RetryDecision::RetrySameKey {
                delay: *retry_after,
            },
            SynthesisError::Timeout(_)
            | SynthesisError::Network(_)
            | SynthesisError::NoContent(_) => RetryDecision::RetrySameKey { delay: None },
            _ => return RetryDecision::Fail(error.clone()),
        };

        let attempts = failed_attempts + 1;
        if attempts >= self.max_attempts {
            return RetryDecision::Fail(SynthesisError::MaxRetriesExceeded {
                attempts,
                last_error: error.to_string(),
            });
        }
        retry
    }
}
