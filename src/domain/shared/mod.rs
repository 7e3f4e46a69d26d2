pub mod clock;
pub mod usage_dto;

pub use clock::{Clock, ManualClock, SystemClock};
pub use usage_dto::UsageStats;
