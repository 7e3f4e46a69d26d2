use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::model::ModelLimits;
use crate::domain::shared::UsageStats;

pub const RPM_WINDOW_SECS: i64 = 60;

/// Per-key request counters for the rolling minute window and the UTC day.
///
/// Reads are window-aware: once a window has elapsed the stale counter reads as zero,
/// and the next `record_use` starts a fresh window at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaTracker {
    pub rpm_count: u32,
    pub rpm_window_start: Option<DateTime<Utc>>,
    pub rpd_count: u32,
    pub rpd_date: Option<NaiveDate>,
}

fn rpm_window() -> Duration {
    Duration::seconds(RPM_WINDOW_SECS)
}

/// Start of the next UTC day, when daily counters roll over.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Duration::days(1);
    tomorrow.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl QuotaTracker {
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        match self.rpm_window_start {
            Some(start) if now < start + rpm_window() => self.rpm_count += 1,
            _ => {
                self.rpm_count = 1;
                self.rpm_window_start = Some(now);
            }
        }

        let today = now.date_naive();
        if self.rpd_date == Some(today) {
            self.rpd_count += 1;
        } else {
            self.rpd_count = 1;
            self.rpd_date = Some(today);
        }
    }

    pub fn rpm_used(&self, now: DateTime<Utc>) -> u32 {
        match self.rpm_window_start {
            Some(start) if now < start + rpm_window() => self.rpm_count,
            _ => 0,
        }
    }

    pub fn rpd_used(&self, now: DateTime<Utc>) -> u32 {
        if self.rpd_date == Some(now.date_naive()) {
            self.rpd_count
        } else {
            0
        }
    }

    pub fn is_in_cooldown(&self, limits: &ModelLimits, now: DateTime<Utc>) -> bool {
        self.rpm_used(now) >= limits.rpm
    }

    pub fn is_exhausted(&self, limits: &ModelLimits, now: DateTime<Utc>) -> bool {
        self.rpd_used(now) >= limits.rpd
    }

    /// When the current minute window closes, if one is open.
    pub fn rpm_window_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.rpm_window_start
            .map(|start| start + rpm_window())
            .filter(|end| *end > now)
    }

    pub fn usage(&self, limits: &ModelLimits, now: DateTime<Utc>) -> UsageStats {
        UsageStats {
            rpm_used: self.rpm_used(now),
            rpm_limit: limits.rpm,
            rpd_used: self.rpd_used(now),
            rpd_limit: limits.rpd,
            rpm_resets_at: self.rpm_window_end(now),
            rpd_resets_at: next_utc_midnight(now),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limits() -> ModelLimits {
        ModelLimits { rpm: 2, rpd: 3 }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_cooldown_after_rpm_limit_and_release_after_window() {
        let mut quota = QuotaTracker::default();
        let t0 = at(10, 0, 0);

        quota.record_use(t0);
        assert!(!quota.is_in_cooldown(&limits(), t0));
        quota.record_use(t0 + Duration::seconds(1));
        assert!(quota.is_in_cooldown(&limits(), t0 + Duration::seconds(1)));
        assert!(quota.is_in_cooldown(&limits(), t0 + Duration::seconds(59)));

        // One second past the window boundary
        assert!(!quota.is_in_cooldown(&limits(), t0 + Duration::seconds(61)));
        assert_eq!(quota.rpm_used(t0 + Duration::seconds(61)), 0);
    }

    #[test]
    fn test_record_use_after_window_starts_new_window() {
        let mut quota = QuotaTracker::default();
        let t0 = at(10, 0, 0);
        quota.record_use(t0);
        quota.record_use(t0 + Duration::seconds(10));
        assert_eq!(quota.rpm_count, 2);

        let later = t0 + Duration::seconds(75);
        quota.record_use(later);
        assert_eq!(quota.rpm_count, 1);
        assert_eq!(quota.rpm_window_start, Some(later));
    }

    #[test]
    fn test_counters_never_decrease_within_window() {
        let mut quota = QuotaTracker::default();
        let t0 = at(10, 0, 0);
        let mut previous = 0;
        for offset in 0..50 {
            let now = t0 + Duration::seconds(offset);
            quota.record_use(now);
            let used = quota.rpm_used(now);
            if offset < RPM_WINDOW_SECS {
                assert!(used > previous);
            }
            previous = used;
        }
    }

    #[test]
    fn test_exhaustion_resets_at_utc_midnight() {
        let mut quota = QuotaTracker::default();
        for minute in 0..3 {
            quota.record_use(at(23, minute, 0));
        }
        assert!(quota.is_exhausted(&limits(), at(23, 59, 59)));

        let next_day = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap();
        assert!(!quota.is_exhausted(&limits(), next_day));

        quota.record_use(next_day);
        assert_eq!(quota.rpd_count, 1);
    }

    #[test]
    fn test_usage_view() {
        let mut quota = QuotaTracker::default();
        let t0 = at(8, 30, 0);
        quota.record_use(t0);

        let usage = quota.usage(&limits(), t0 + Duration::seconds(5));
        assert_eq!(usage.rpm_used, 1);
        assert_eq!(usage.rpm_limit, 2);
        assert_eq!(usage.rpd_used, 1);
        assert_eq!(usage.rpd_limit, 3);
        assert_eq!(usage.rpm_resets_at, Some(t0 + Duration::seconds(60)));
        assert_eq!(
            usage.rpd_resets_at,
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut quota = QuotaTracker::default();
        quota.record_use(at(9, 0, 0));
        quota.record_use(at(9, 0, 1));
        quota.reset();
        assert_eq!(quota, QuotaTracker::default());
        assert!(!quota.is_in_cooldown(&limits(), at(9, 0, 2)));
    }
}
