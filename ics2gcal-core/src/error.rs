//! Error types for the ics2gcal engine.

use std::fmt;

use thiserror::Error;

/// Machine-readable reason attached to a rejected remote operation.
///
/// Only `Duplicate` triggers a recovery path (the single clear-and-retry on
/// create); everything else is reported per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteReason {
    /// The remote still holds a record under the submitted identifier.
    Duplicate,
    Other(String),
}

impl RemoteReason {
    pub fn from_reason_str(reason: &str) -> Self {
        match reason {
            "duplicate" => RemoteReason::Duplicate,
            other => RemoteReason::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RemoteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteReason::Duplicate => write!(f, "duplicate"),
            RemoteReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Errors that can occur during a reconciliation run.
///
/// `CalendarNotFound` and `MalformedSource` are fatal and abort the run
/// before any plan work. `Remote` failures are per-item: the executor reports
/// them and carries on. Identity collisions between distinct source UIDs are
/// not detected at all.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Malformed source document: {0}")]
    MalformedSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote operation failed ({reason}): {message}")]
    Remote {
        reason: RemoteReason,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn remote(reason: RemoteReason, message: impl Into<String>) -> Self {
        SyncError::Remote {
            reason,
            message: message.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            SyncError::Remote {
                reason: RemoteReason::Duplicate,
                ..
            }
        )
    }
}

/// Result type alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
