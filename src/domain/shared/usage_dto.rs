use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota consumption of one key against its model's limits.
/// Derived on read, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub rpm_used: u32,
    pub rpm_limit: u32,
    pub rpd_used: u32,
    pub rpd_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm_resets_at: Option<DateTime<Utc>>,
    pub rpd_resets_at: DateTime<Utc>,
}
