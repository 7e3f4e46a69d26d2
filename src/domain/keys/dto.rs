use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{KeyId, KeyStatus};
use crate::domain::shared::UsageStats;

/// Per-key monitoring view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStatusView {
    pub id: KeyId,
    pub label: String,
    pub model: String,
    pub masked_secret: String,
    pub status: KeyStatus,
    pub is_active: bool,
    pub available: bool,
    pub in_cooldown: bool,
    pub is_exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    pub usage: UsageStats,
    pub total_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Request for POST /api/keys
#[derive(Debug, Serialize, Deserialize)]
pub struct AddKeysRequest {
    pub keys: Vec<NewKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKey {
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Request for PATCH /api/keys/:id
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Response for POST /api/keys/reset
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetAllResponse {
    pub reset: usize,
}

/// Response for POST /api/keys/:id/validate
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub key: KeyStatusView,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
