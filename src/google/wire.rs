//! Wire types for the Calendar v3 API and conversions to and from the
//! engine's event model.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use ics2gcal_core::event::{CanonicalEvent, EventTime, RemoteEvent};

/// Google's date-or-dateTime tagged value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleEvent {
    pub id: String,
    pub summary: String,
    pub status: String,
    pub start: Option<GoogleTime>,
    pub end: Option<GoogleTime>,
    pub recurrence: Option<Vec<String>>,
    pub recurring_event_id: Option<String>,
    pub original_start_time: Option<GoogleTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListPage {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListPage {
    #[serde(default)]
    pub items: Vec<GoogleCalendarEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleCalendarEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
}

/// Error body: `{"error": {"message": ..., "errors": [{"reason": ...}]}}`.
#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    pub error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<GoogleErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorItem {
    #[serde(default)]
    pub reason: String,
}

/// Request body for insert and patch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub start: GoogleTime,
    pub end: GoogleTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
}

/// Build the request body for insert/patch. An empty canonical id is
/// omitted so the remote assigns one; patch bodies never carry an id.
pub fn to_google_payload(event: &CanonicalEvent, zone: &str, include_id: bool) -> GoogleEventPayload {
    GoogleEventPayload {
        id: (include_id && !event.id.is_empty()).then(|| event.id.clone()),
        summary: event.summary.clone(),
        start: to_google_time(&event.start, zone),
        end: to_google_time(&event.end, zone),
        recurrence: event.recurrence.clone(),
    }
}

/// Reduce a listed event to the fields the engine reads. Events without a
/// usable start are dropped.
pub fn from_google_event(event: GoogleEvent) -> Option<RemoteEvent> {
    let start = from_google_time(event.start.as_ref()?)?;
    let end = event
        .end
        .as_ref()
        .and_then(from_google_time)
        .unwrap_or_else(|| start.clone());
    let original_start = event.original_start_time.as_ref().and_then(from_google_time);

    Some(RemoteEvent {
        id: event.id,
        summary: event.summary,
        start,
        end,
        recurrence: event.recurrence,
        is_recurring_instance: event.recurring_event_id.is_some(),
        series_id: event.recurring_event_id,
        original_start,
    })
}

fn to_google_time(time: &EventTime, zone: &str) -> GoogleTime {
    match time {
        // Whole-day values carry no time zone.
        EventTime::Date(d) => GoogleTime {
            date: Some(*d),
            date_time: None,
            time_zone: None,
        },
        EventTime::DateTime(dt) => GoogleTime {
            date: None,
            date_time: Some(*dt),
            time_zone: Some(zone.to_string()),
        },
    }
}

fn from_google_time(time: &GoogleTime) -> Option<EventTime> {
    if let Some(dt) = time.date_time {
        Some(EventTime::DateTime(dt))
    } else {
        time.date.map(EventTime::Date)
    }
}
