//! Remote calendar collaborator interface and window scanning.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::event::{CanonicalEvent, RemoteCalendarInfo, RemoteEvent};
use crate::window::SyncWindow;

/// One page of a windowed event listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<RemoteEvent>,
    /// Continuation token for the next page; `None` means the listing is
    /// complete.
    pub next_page_token: Option<String>,
}

/// The remote calendar collaborator.
///
/// The engine is single-threaded, so the returned futures carry no Send
/// bound.
#[allow(async_fn_in_trait)]
pub trait RemoteCalendar {
    async fn list_calendars(&self) -> SyncResult<Vec<RemoteCalendarInfo>>;

    /// One page of events intersecting the window.
    async fn list_events(
        &self,
        calendar_id: &str,
        window: &SyncWindow,
        page_token: Option<&str>,
    ) -> SyncResult<EventPage>;

    /// Every materialized occurrence of a recurring series, not just those
    /// inside the reconciliation window.
    async fn list_instances(
        &self,
        calendar_id: &str,
        series_id: &str,
    ) -> SyncResult<Vec<RemoteEvent>>;

    /// Create an event. An empty `id` on the payload asks the remote to
    /// assign one.
    async fn insert(&self, calendar_id: &str, event: &CanonicalEvent) -> SyncResult<RemoteEvent>;

    /// Patch the event stored under `event_id` with the canonical fields.
    async fn patch(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CanonicalEvent,
    ) -> SyncResult<RemoteEvent>;

    async fn delete(&self, calendar_id: &str, event_id: &str) -> SyncResult<()>;
}

/// Resolve a calendar display name to its remote id. A name matching no
/// remote calendar is fatal.
pub async fn find_calendar_id<R: RemoteCalendar>(
    remote: &R,
    display_name: &str,
) -> SyncResult<String> {
    let calendars = remote.list_calendars().await?;
    calendars
        .into_iter()
        .find(|c| c.display_name == display_name)
        .map(|c| c.id)
        .ok_or_else(|| SyncError::CalendarNotFound(display_name.to_string()))
}

/// Scan the complete remote event set for the window, following pagination
/// until the collaborator stops returning a continuation token. No ordering
/// of the returned events is assumed.
pub async fn scan_events<R: RemoteCalendar>(
    remote: &R,
    calendar_id: &str,
    window: &SyncWindow,
) -> SyncResult<Vec<RemoteEvent>> {
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = remote
            .list_events(calendar_id, window, page_token.as_deref())
            .await?;
        debug!(count = page.events.len(), "scanned remote page");
        events.extend(page.events);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(events)
}
