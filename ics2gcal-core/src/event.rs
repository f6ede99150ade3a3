//! Normalized event types shared by the engine and remote collaborators.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// An event boundary: either a whole-day calendar date or an instant with a
/// fixed UTC offset. Never both.
///
/// Equality on the `DateTime` variant compares the absolute instant, not the
/// offset label, so a value expressed in two zones still matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl EventTime {
    /// Monotonic key for ordering mixed date/datetime values.
    pub(crate) fn ordinal(&self) -> i64 {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc().timestamp(),
            EventTime::DateTime(dt) => dt.timestamp(),
        }
    }
}

/// The normalized unit of local truth.
///
/// Exactly one of three shapes: a plain event (no recurrence, no anchor), a
/// series master (`recurrence` set), or an exception (`recurrence_anchor`
/// set). Two canonical events share an `id` only when one is an exception of
/// the other's series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Derived from the source UID; stable across runs. An empty id asks the
    /// remote to assign one (used by the duplicate-create retry).
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub categories: BTreeSet<String>,
    /// RRULE/EXDATE/RDATE lines; present only on series masters.
    pub recurrence: Option<Vec<String>>,
    /// Original occurrence time; present only on exception records.
    pub recurrence_anchor: Option<EventTime>,
}

impl CanonicalEvent {
    pub fn is_master(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn is_exception(&self) -> bool {
        self.recurrence_anchor.is_some()
    }

    /// Content agreement with a scanned remote event. The planner uses this
    /// to consume a matched pair without queueing a no-op update.
    ///
    /// Recurrence lines count as content: a master whose rule changed must
    /// not be consumed as unchanged, or the remote series would stay stale.
    pub fn matches_remote(&self, remote: &RemoteEvent) -> bool {
        self.summary == remote.summary
            && self.start == remote.start
            && self.end == remote.end
            && self.recurrence == remote.recurrence
    }
}

/// A scanned remote event, reduced to the fields the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    /// Recurrence lines as stored remotely; present on series masters.
    pub recurrence: Option<Vec<String>>,
    /// True for a materialized occurrence of a recurring series.
    pub is_recurring_instance: bool,
    /// Id of the owning series, set on instances.
    pub series_id: Option<String>,
    /// The occurrence's original (pre-override) time, set on instances.
    pub original_start: Option<EventTime>,
}

/// A remote calendar as listed by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCalendarInfo {
    pub id: String,
    pub display_name: String,
}

/// Exceptions grouped by the id of their master series, each group ordered
/// by recurrence anchor.
pub type ExceptionGroups = BTreeMap<String, Vec<CanonicalEvent>>;
