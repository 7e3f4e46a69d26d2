use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quota::QuotaTracker;

pub type KeyId = Uuid;

/// Lifecycle status of a credential as last observed from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Unknown,
    Valid,
    Invalid,
    RateLimited,
    Suspended,
    NoCredits,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Unknown => "unknown",
            KeyStatus::Valid => "valid",
            KeyStatus::Invalid => "invalid",
            KeyStatus::RateLimited => "rate_limited",
            KeyStatus::Suspended => "suspended",
            KeyStatus::NoCredits => "no_credits",
        }
    }

    /// Statuses that keep a key out of rotation until an operator resets it.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            KeyStatus::Invalid | KeyStatus::Suspended | KeyStatus::NoCredits
        )
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provider credential together with its quota counters.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: KeyId,
    pub secret: String,
    pub label: String,
    pub model: String,
    pub status: KeyStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    pub is_active: bool,
    /// Lifetime successful requests, used to balance load across keys.
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub quota: QuotaTracker,
    /// Cooldown requested by the provider (429 retry delay), on top of the local RPM window.
    #[serde(default)]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_validated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn new(secret: String, label: String, model: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            secret,
            label,
            model,
            status: KeyStatus::Unknown,
            status_message: None,
            is_active: true,
            total_requests: 0,
            quota: QuotaTracker::default(),
            cooldown_until: None,
            last_used_at: None,
            last_validated_at: None,
            created_at: now,
        }
    }

    pub fn limits(&self) -> ModelLimits {
        ModelLimits::for_model(&self.model)
    }

    /// Last four characters of the secret, for display.
    pub fn masked_secret(&self) -> String {
        let tail: String = self
            .secret
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", tail)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("secret", &self.masked_secret())
            .field("label", &self.label)
            .field("model", &self.model)
            .field("status", &self.status)
            .field("is_active", &self.is_active)
            .field("total_requests", &self.total_requests)
            .field("quota", &self.quota)
            .field("cooldown_until", &self.cooldown_until)
            .finish()
    }
}

/// Free-tier request ceilings of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimits {
    pub rpm: u32,
    pub rpd: u32,
}

const MODEL_LIMITS: &[(&str, ModelLimits)] = &[
    ("gemini-2.5-flash-preview-tts", ModelLimits { rpm: 3, rpd: 15 }),
    ("gemini-2.5-pro-preview-tts", ModelLimits { rpm: 3, rpd: 15 }),
    ("gemini-3-flash-preview", ModelLimits { rpm: 5, rpd: 20 }),
    ("gemini-2.5-pro", ModelLimits { rpm: 2, rpd: 50 }),
    ("gemini-2.5-flash", ModelLimits { rpm: 10, rpd: 250 }),
    ("gemini-2.5-flash-lite", ModelLimits { rpm: 15, rpd: 1000 }),
    ("gemini-2.0-flash", ModelLimits { rpm: 15, rpd: 200 }),
    ("gemini-2.0-flash-lite", ModelLimits { rpm: 30, rpd: 200 }),
    ("gemini-2.0-flash-exp", ModelLimits { rpm: 15, rpd: 200 }),
    ("gemini-1.5-flash", ModelLimits { rpm: 15, rpd: 50 }),
    ("gemini-1.5-flash-8b", ModelLimits { rpm: 15, rpd: 50 }),
    ("gemini-1.5-pro", ModelLimits { rpm: 2, rpd: 50 }),
];

impl ModelLimits {
    /// Exact-name lookup; unknown models get the most conservative ceilings in the table.
    pub fn for_model(model: &str) -> Self {
        MODEL_LIMITS
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, limits)| *limits)
            .unwrap_or_else(Self::most_conservative)
    }

    pub fn most_conservative() -> Self {
        MODEL_LIMITS.iter().fold(
            ModelLimits {
                rpm: u32::MAX,
                rpd: u32::MAX,
            },
            |acc, (_, limits)| ModelLimits {
                rpm: acc.rpm.min(limits.rpm),
                rpd: acc.rpd.min(limits.rpd),
            },
        )
    }
}
