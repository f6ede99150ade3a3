//! Reconciliation window.

use chrono::{DateTime, Duration, Utc};

/// Days either side of the run time covered by a default window.
pub const DEFAULT_WINDOW_DAYS: i64 = 365;

/// The bounded time range scanned and reconciled in one run.
#[derive(Debug, Clone)]
pub struct SyncWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Default for SyncWindow {
    fn default() -> Self {
        Self::around_now(DEFAULT_WINDOW_DAYS)
    }
}

impl SyncWindow {
    /// Window of ±days around the current run time.
    pub fn around_now(days: i64) -> Self {
        let now = Utc::now();
        SyncWindow {
            from: now - Duration::days(days),
            to: now + Duration::days(days),
        }
    }

    pub fn from_rfc3339(&self) -> String {
        self.from.to_rfc3339()
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339()
    }
}
