//! Run configuration supplied by the CLI layer.

use std::collections::HashSet;

use crate::window::DEFAULT_WINDOW_DAYS;

/// Output zone applied to corrected date-times when none is configured.
pub const DEFAULT_TIME_ZONE: &str = "Asia/Tokyo";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Display name of the remote calendar to reconcile against.
    pub calendar_name: String,
    /// Local events in any of these categories are never created remotely.
    /// Exclusion only suppresses creation; existing remote events stay
    /// eligible for update and delete.
    pub exclude_categories: HashSet<String>,
    /// Half-width of the reconciliation window, in days either side of now.
    pub window_days: i64,
    /// Output time zone name for corrected date-times.
    pub time_zone: String,
}

impl SyncConfig {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        SyncConfig {
            calendar_name: calendar_name.into(),
            exclude_categories: HashSet::new(),
            window_days: DEFAULT_WINDOW_DAYS,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
        }
    }
}
