//! Timezone correction for naively-parsed local times.
//!
//! The raw parser keeps the clock digits exactly as written in the document
//! and records only the attached zone *name*. To get a correct absolute
//! instant the digits must be shifted by the difference between the
//! configured output zone's offset and the named zone's offset, then
//! relabelled with the output zone's fixed offset. Whole-day dates are never
//! shifted or relabelled.

use std::collections::HashMap;

use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::event::EventTime;
use crate::source::SourceTime;

/// Standard UTC offsets per zone name, built from the document's VTIMEZONE
/// definition blocks.
#[derive(Debug, Clone, Default)]
pub struct TzDefinitions {
    offsets: HashMap<String, FixedOffset>,
}

impl TzDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, offset: FixedOffset) {
        self.offsets.insert(name.into(), offset);
    }

    pub fn offset_of(&self, name: &str) -> Option<FixedOffset> {
        self.offsets.get(name).copied()
    }
}

/// The configured output zone: a name plus the fixed offset events are
/// relabelled with.
#[derive(Debug, Clone)]
pub struct OutputZone {
    pub name: String,
    pub offset: FixedOffset,
}

impl OutputZone {
    /// Resolve a named zone (e.g. "Asia/Tokyo") to its current UTC offset.
    pub fn resolve(name: &str) -> SyncResult<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|_| SyncError::Config(format!("Unknown output time zone '{name}'")))?;
        let offset = tz.offset_from_utc_datetime(&Utc::now().naive_utc()).fix();
        Ok(OutputZone {
            name: name.to_string(),
            offset,
        })
    }
}

/// Correct one raw time value against the configured output zone.
///
/// - Whole-day dates pass through untouched.
/// - A datetime with a named zone is shifted by
///   `output offset − named zone offset` when the name resolves in the
///   definitions. An unknown name only logs a warning and the value is
///   relabelled without shifting (policy, not failure).
/// - A datetime without a zone name is assumed correct and only relabelled.
pub fn correct_time(raw: &SourceTime, defs: &TzDefinitions, zone: &OutputZone) -> EventTime {
    match raw {
        SourceTime::Date(d) => EventTime::Date(*d),
        SourceTime::DateTime { datetime, tzid } => {
            let shifted = match tzid.as_deref() {
                Some(name) => match defs.offset_of(name) {
                    Some(named) => {
                        let delta = zone.offset.local_minus_utc() - named.local_minus_utc();
                        *datetime + Duration::seconds(i64::from(delta))
                    }
                    None => {
                        warn!(
                            zone = name,
                            "time zone not defined in source document, leaving clock value uncorrected"
                        );
                        *datetime
                    }
                },
                None => *datetime,
            };
            relabel(shifted, zone.offset)
        }
    }
}

/// Relabel without shifting. Used for exception records, whose clock values
/// are taken as already being in the output zone.
pub fn relabel_time(raw: &SourceTime, zone: &OutputZone) -> EventTime {
    match raw {
        SourceTime::Date(d) => EventTime::Date(*d),
        SourceTime::DateTime { datetime, .. } => relabel(*datetime, zone.offset),
    }
}

fn relabel(naive: NaiveDateTime, offset: FixedOffset) -> EventTime {
    // A fixed offset has no gaps or overlaps, so this cannot fail.
    EventTime::DateTime(offset.from_local_datetime(&naive).unwrap())
}
