use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::dto::{AddKeysRequest, KeyStatusView, ResetAllResponse, UpdateKeyRequest, ValidationResponse};
use super::error::KeyServiceError;
use super::model::{ApiKey, KeyId};
use super::pool::KeyPool;
use crate::domain::jobs::JobEvent;
use crate::domain::shared::Clock;
use crate::infrastructure::repositories::{ChunkSynthesizer, KeyRepository};

pub struct KeyService {
    pool: Arc<KeyPool>,
    synthesizer: Arc<dyn ChunkSynthesizer>,
    repository: Arc<dyn KeyRepository>,
    clock: Arc<dyn Clock>,
    default_model: String,
}

impl KeyService {
    pub fn new(
        pool: Arc<KeyPool>,
        synthesizer: Arc<dyn ChunkSynthesizer>,
        repository: Arc<dyn KeyRepository>,
        clock: Arc<dyn Clock>,
        default_model: String,
    ) -> Self {
        Self {
            pool,
            synthesizer,
            repository,
            clock,
            default_model,
        }
    }
}

#[async_trait]
pub trait KeyServiceApi: Send + Sync {
    async fn list_statuses(&self) -> Vec<KeyStatusView>;

    /// Add keys to the pool
    ///
    /// Secrets already in the pool (or repeated within the request) are rejected as a whole,
    /// so a request either adds every key or none.
    async fn add_keys(&self, request: AddKeysRequest) -> Result<Vec<KeyStatusView>, KeyServiceError>;

    async fn remove_key(&self, key_id: KeyId) -> Result<(), KeyServiceError>;

    async fn update_key(
        &self,
        key_id: KeyId,
        request: UpdateKeyRequest,
    ) -> Result<KeyStatusView, KeyServiceError>;

    /// Check a key against the provider
    ///
    /// Key-fatal answers update the key's status; transient failures leave it untouched
    /// and are only reported back.
    async fn validate_key(&self, key_id: KeyId) -> Result<ValidationResponse, KeyServiceError>;

    async fn reset_key(&self, key_id: KeyId) -> Result<KeyStatusView, KeyServiceError>;

    async fn reset_all(&self) -> Result<ResetAllResponse, KeyServiceError>;
}

#[async_trait]
impl KeyServiceApi for KeyService {
    async fn list_statuses(&self) -> Vec<KeyStatusView> {
        self.pool.status_views()
    }

    async fn add_keys(&self, request: AddKeysRequest) -> Result<Vec<KeyStatusView>, KeyServiceError> {
        if request.keys.is_empty() {
            return Err(KeyServiceError::Invalid("no keys given".to_string()));
        }

        let mut seen = HashSet::new();
        for new_key in &request.keys {
            let secret = new_key.secret.trim();
            if secret.is_empty() {
                return Err(KeyServiceError::Invalid("key secret is empty".to_string()));
            }
            if !seen.insert(secret.to_string()) || self.pool.contains_secret(secret) {
                return Err(KeyServiceError::Duplicate(format!(
                    "a key ending in {} is already registered",
                    secret_tail(secret)
                )));
            }
        }

        let now = self.clock.now();
        let first_number = self.pool.len() + 1;
        let keys: Vec<ApiKey> = request
            .keys
            .into_iter()
            .enumerate()
            .map(|(offset, new_key)| {
                let label = non_empty(new_key.label)
                    .unwrap_or_else(|| format!("Key {}", first_number + offset));
                let model = non_empty(new_key.model).unwrap_or_else(|| self.default_model.clone());
                ApiKey::new(new_key.secret.trim().to_string(), label, model, now)
            })
            .collect();
        let added: Vec<KeyId> = keys.iter().map(|key| key.id).collect();

        // Re-checked under the pool lock, so a concurrent request cannot slip the same secret in
        self.pool.add_keys(keys)?;
        self.persist().await?;
        added
            .into_iter()
            .map(|id| self.pool.status_view(id).map_err(KeyServiceError::from))
            .collect()
    }

    async fn remove_key(&self, key_id: KeyId) -> Result<(), KeyServiceError> {
        if let Some(holder) = self.pool.holder(key_id) {
            tracing::warn!(key_id = %key_id, job_id = %holder, "Refusing to remove a key in use");
            return Err(KeyServiceError::InUse(key_id));
        }
        self.pool.remove_key(key_id)?;
        self.persist().await
    }

    async fn update_key(
        &self,
        key_id: KeyId,
        request: UpdateKeyRequest,
    ) -> Result<KeyStatusView, KeyServiceError> {
        let label = match request.label {
            Some(label) if label.trim().is_empty() => {
                return Err(KeyServiceError::Invalid("label is empty".to_string()));
            }
            Some(label) => Some(label.trim().to_string()),
            None => None,
        };

        if let Some(is_active) = request.is_active {
            self.pool.set_active(key_id, is_active)?;
        }
        if let Some(label) = label {
            self.pool.set_label(key_id, label)?;
        }
        self.persist().await?;
        Ok(self.pool.status_view(key_id)?)
    }

    async fn validate_key(&self, key_id: KeyId) -> Result<ValidationResponse, KeyServiceError> {
        let lease = self.pool.credentials(key_id)?;
        tracing::info!(key_id = %key_id, label = %lease.label, "Validating key");

        let error = match self.synthesizer.validate_key(&lease).await {
            Ok(()) => {
                self.pool.mark_validated(key_id)?;
                None
            }
            Err(e) => {
                if let Some(status) = e.key_status() {
                    self.pool.set_status(key_id, status, Some(e.to_string()))?;
                } else {
                    tracing::warn!(key_id = %key_id, error = %e, "Key validation inconclusive");
                }
                Some(e.to_string())
            }
        };

        self.persist().await?;
        Ok(ValidationResponse {
            key: self.pool.status_view(key_id)?,
            valid: error.is_none(),
            error,
        })
    }

    async fn reset_key(&self, key_id: KeyId) -> Result<KeyStatusView, KeyServiceError> {
        self.pool.reset_one(key_id)?;
        self.persist().await?;
        Ok(self.pool.status_view(key_id)?)
    }

    async fn reset_all(&self) -> Result<ResetAllResponse, KeyServiceError> {
        let reset = self.pool.reset_all();
        self.persist().await?;
        Ok(ResetAllResponse { reset })
    }
}

impl KeyService {
    /// Adds secrets from the environment that the pool does not know yet. Returns how many were added.
    pub fn seed_secrets(&self, secrets: &[String]) -> usize {
        let now = self.clock.now();
        let mut added = 0;
        for secret in secrets.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if self.pool.contains_secret(secret) {
                continue;
            }
            let label = format!("Env key {}", secret_tail(secret));
            self.pool.add_key(ApiKey::new(
                secret.to_string(),
                label,
                self.default_model.clone(),
                now,
            ));
            added += 1;
        }
        added
    }

    pub async fn persist(&self) -> Result<(), KeyServiceError> {
        self.repository
            .save(&self.pool.snapshot())
            .await
            .map_err(KeyServiceError::from)
    }

    /// Writes the pool snapshot whenever a job finishes, so counters and demotions survive restarts.
    pub async fn persist_on_job_events(self: Arc<Self>, mut events: broadcast::Receiver<JobEvent>) {
        loop {
            match events.recv().await {
                Ok(event) if event.is_terminal() => {
                    if let Err(e) = self.persist().await {
                        tracing::error!(job_id = %event.job_id, error = %e, "Failed to persist keys");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Key persistence lagged behind job events");
                    if let Err(e) = self.persist().await {
                        tracing::error!(error = %e, "Failed to persist keys");
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn secret_tail(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
