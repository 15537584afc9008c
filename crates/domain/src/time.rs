//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for scheduled commands and cron ticks.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Time remaining until `at`, or `None` when `at` is already in the past.
#[must_use]
pub fn duration_until(at: Timestamp) -> Option<std::time::Duration> {
    (at - now()).to_std().ok()
}
