use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;

use crate::domain::keys::ApiKey;
use crate::error::AppResult;

/// Durable storage for the key pool.
#[async_trait]
pub trait KeyRepository: Send + Sync {
    async fn load(&self) -> AppResult<Vec<ApiKey>>;

    /// Replaces the stored keys with `keys`.
    async fn save(&self, keys: &[ApiKey]) -> AppResult<()>;
}

/// Keeps keys as a pretty-printed JSON array on disk.
pub struct JsonFileKeyRepository {
    path: PathBuf,
    /// Saves share one tmp file; only one may write-and-rename at a time.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileKeyRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl KeyRepository for JsonFileKeyRepository {
    async fn load(&self) -> AppResult<Vec<ApiKey>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Keys file not found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<ApiKey> = serde_json::from_str(&raw)?;
        tracing::info!(path = %self.path.display(), count = keys.len(), "Keys loaded");
        Ok(keys)
    }

    async fn save(&self, keys: &[ApiKey]) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash never leaves a truncated file
        let json = serde_json::to_vec_pretty(keys)?;
        let _guard = self.write_lock.lock().await;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), count = keys.len(), "Keys saved");
        Ok(())
    }
}

/// Non-durable repository for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryKeyRepository {
    keys: Mutex<Vec<ApiKey>>,
}

impl InMemoryKeyRepository {
    pub fn new(keys: Vec<ApiKey>) -> Self {
        Self {
            keys: Mutex::new(keys),
        }
    }
}

#[async_trait]
impl KeyRepository for InMemoryKeyRepository {
    async fn load(&self) -> AppResult<Vec<ApiKey>> {
        Ok(self.keys.lock().clone())
    }

    async fn save(&self, keys: &[ApiKey]) -> AppResult<()> {
        *self.keys.lock() = keys.to_vec();
        Ok(())
    }
}
