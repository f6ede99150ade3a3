//! Source document reader.
//!
//! Parses an .ics text into raw event records and the document's timezone
//! definitions using the icalendar crate's parser. Events come out in
//! document order; nothing is normalized here beyond shape, and clock digits
//! are kept exactly as written.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use icalendar::parser::{Component, Property, read_calendar, unfold};

use crate::error::{SyncError, SyncResult};
use crate::timezone::TzDefinitions;

/// A raw date-or-datetime as parsed. A datetime keeps the written digits and
/// records only the TZID parameter, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceTime {
    Date(NaiveDate),
    DateTime {
        datetime: NaiveDateTime,
        tzid: Option<String>,
    },
}

/// One parsed VEVENT.
#[derive(Debug, Clone)]
pub struct SourceEvent {
    pub uid: String,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub start: SourceTime,
    pub end: SourceTime,
    /// Raw RRULE property values, in source order.
    pub rrules: Vec<String>,
    /// Raw EXDATE property values, in source order.
    pub exdates: Vec<String>,
    /// Raw RDATE property values, in source order.
    pub rdates: Vec<String>,
    /// RECURRENCE-ID value for a modified instance of a series.
    pub recurrence_anchor: Option<SourceTime>,
}

/// The parsed document: events in source order plus zone definitions.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub events: Vec<SourceEvent>,
    pub tz_definitions: TzDefinitions,
}

/// Parse an .ics document. A text that does not parse as a calendar is a
/// fatal `MalformedSource` error.
pub fn parse_document(content: &str) -> SyncResult<SourceDocument> {
    let unfolded = unfold(content);
    let calendar =
        read_calendar(&unfolded).map_err(|e| SyncError::MalformedSource(e.to_string()))?;

    let mut tz_definitions = TzDefinitions::new();
    let mut events = Vec::new();

    for component in &calendar.components {
        match component.name.as_ref() {
            "VTIMEZONE" => read_vtimezone(component, &mut tz_definitions),
            "VEVENT" => {
                if let Some(event) = read_vevent(component) {
                    events.push(event);
                }
            }
            _ => {}
        }
    }

    Ok(SourceDocument {
        events,
        tz_definitions,
    })
}

/// Record the zone's standard offset (TZOFFSETTO of the STANDARD block,
/// falling back to DAYLIGHT when no STANDARD block exists).
fn read_vtimezone(component: &Component<'_>, defs: &mut TzDefinitions) {
    let Some(tzid) = component.find_prop("TZID") else {
        return;
    };
    let block = component
        .components
        .iter()
        .find(|c| c.name == "STANDARD")
        .or_else(|| component.components.iter().find(|c| c.name == "DAYLIGHT"));
    let Some(block) = block else {
        return;
    };
    let Some(raw) = block.find_prop("TZOFFSETTO") else {
        return;
    };
    if let Some(offset) = parse_utc_offset(raw.val.as_ref()) {
        defs.insert(tzid.val.to_string(), offset);
    }
}

fn read_vevent(component: &Component<'_>) -> Option<SourceEvent> {
    let uid = component.find_prop("UID")?.val.to_string();
    let summary = component.find_prop("SUMMARY").map(|p| p.val.to_string());

    let categories = component
        .properties
        .iter()
        .filter(|p| p.name == "CATEGORIES")
        .flat_map(|p| p.val.as_ref().split(','))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let start = parse_time_prop(component.find_prop("DTSTART")?)?;
    let end = component
        .find_prop("DTEND")
        .and_then(parse_time_prop)
        .unwrap_or_else(|| start.clone());

    let recurrence_anchor = component.find_prop("RECURRENCE-ID").and_then(parse_time_prop);

    Some(SourceEvent {
        uid,
        summary,
        categories,
        start,
        end,
        rrules: prop_values(component, "RRULE"),
        exdates: prop_values(component, "EXDATE"),
        rdates: prop_values(component, "RDATE"),
        recurrence_anchor,
    })
}

fn prop_values(component: &Component<'_>, name: &str) -> Vec<String> {
    component
        .properties
        .iter()
        .filter(|p| p.name == name)
        .map(|p| p.val.to_string())
        .collect()
}

/// Parse a DTSTART/DTEND/RECURRENCE-ID property, keeping the clock digits as
/// written and recording only the TZID parameter.
fn parse_time_prop(prop: &Property<'_>) -> Option<SourceTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    let raw = prop.val.as_ref();
    if is_date || !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y%m%d")
            .ok()
            .map(SourceTime::Date);
    }

    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S")
        .ok()
        .map(|datetime| SourceTime::DateTime { datetime, tzid })
}

/// Parse an ICS UTC offset like "+0900", "-0500" or "+093000".
fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let (behind, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    let seconds: i32 = if digits.len() >= 6 {
        digits[4..6].parse().ok()?
    } else {
        0
    };
    let total = hours * 3600 + minutes * 60 + seconds;
    if behind {
        FixedOffset::west_opt(total)
    } else {
        FixedOffset::east_opt(total)
    }
}
