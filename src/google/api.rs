//! HTTP client for the Google Calendar v3 API.

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use ics2gcal_core::error::{RemoteReason, SyncError, SyncResult};
use ics2gcal_core::event::{CanonicalEvent, RemoteCalendarInfo, RemoteEvent};
use ics2gcal_core::remote::{EventPage, RemoteCalendar};
use ics2gcal_core::window::SyncWindow;

use crate::auth;
use crate::google::wire;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Remote calendar backed by the Calendar v3 REST API.
pub struct GoogleRemote {
    client: reqwest::Client,
    access_token: String,
    /// IANA zone name written into timed event payloads.
    time_zone: String,
}

impl GoogleRemote {
    /// Build a client from the tokens stored on disk, refreshing the access
    /// token if it has expired.
    pub async fn from_stored_tokens(time_zone: &str) -> anyhow::Result<Self> {
        let tokens = auth::valid_tokens().await?;
        Ok(GoogleRemote {
            client: reqwest::Client::new(),
            access_token: tokens.access_token,
            time_zone: time_zone.to_string(),
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&wire::GoogleEventPayload>,
    ) -> SyncResult<Response> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            SyncError::remote(RemoteReason::Other("network".to_string()), err.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> SyncResult<T> {
        let response = self.send(Method::GET, url, query, None).await?;
        decode_json(response).await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    response.json().await.map_err(|err| {
        SyncError::remote(
            RemoteReason::Other("malformed_response".to_string()),
            err.to_string(),
        )
    })
}

/// Map an error response to `SyncError::Remote`, lifting the first machine
/// reason out of the error body when there is one.
async fn error_from_response(response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<wire::GoogleErrorBody>(&body) {
        let reason = parsed
            .error
            .errors
            .first()
            .map(|e| RemoteReason::from_reason_str(&e.reason))
            .unwrap_or_else(|| RemoteReason::Other(status.as_u16().to_string()));
        let message = if parsed.error.message.is_empty() {
            format!("HTTP {status}")
        } else {
            parsed.error.message
        };
        return SyncError::remote(reason, message);
    }

    SyncError::remote(
        RemoteReason::Other(status.as_u16().to_string()),
        format!("HTTP {status}: {body}"),
    )
}

impl RemoteCalendar for GoogleRemote {
    async fn list_calendars(&self) -> SyncResult<Vec<RemoteCalendarInfo>> {
        let url = format!("{API_BASE}/users/me/calendarList");
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: wire::CalendarListPage = self.get_json(&url, &query).await?;
            calendars.extend(page.items.into_iter().map(|entry| RemoteCalendarInfo {
                id: entry.id,
                display_name: entry.summary,
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(calendars)
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        window: &SyncWindow,
        page_token: Option<&str>,
    ) -> SyncResult<EventPage> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events");
        let time_min = window.from.to_rfc3339();
        let time_max = window.to.to_rfc3339();
        let mut query: Vec<(&str, &str)> = vec![
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let page: wire::EventListPage = self.get_json(&url, &query).await?;
        let events = page
            .items
            .into_iter()
            // Cancelled tombstones and id-less entries carry nothing the
            // engine can act on.
            .filter(|event| event.status != "cancelled" && !event.id.is_empty())
            .filter_map(wire::from_google_event)
            .collect();

        Ok(EventPage {
            events,
            next_page_token: page.next_page_token,
        })
    }

    async fn list_instances(
        &self,
        calendar_id: &str,
        series_id: &str,
    ) -> SyncResult<Vec<RemoteEvent>> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events/{series_id}/instances");
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: wire::EventListPage = self.get_json(&url, &query).await?;
            instances.extend(
                page.items
                    .into_iter()
                    .filter(|event| event.status != "cancelled" && !event.id.is_empty())
                    .filter_map(wire::from_google_event),
            );
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(series_id, count = instances.len(), "listed series instances");
        Ok(instances)
    }

    async fn insert(&self, calendar_id: &str, event: &CanonicalEvent) -> SyncResult<RemoteEvent> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events");
        let payload = wire::to_google_payload(event, &self.time_zone, true);
        let response = self.send(Method::POST, &url, &[], Some(&payload)).await?;
        let created: wire::GoogleEvent = decode_json(response).await?;
        wire::from_google_event(created).ok_or_else(|| {
            SyncError::remote(
                RemoteReason::Other("malformed_response".to_string()),
                "created event came back without a start",
            )
        })
    }

    async fn patch(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &CanonicalEvent,
    ) -> SyncResult<RemoteEvent> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events/{event_id}");
        let payload = wire::to_google_payload(event, &self.time_zone, false);
        let response = self.send(Method::PATCH, &url, &[], Some(&payload)).await?;
        let patched: wire::GoogleEvent = decode_json(response).await?;
        wire::from_google_event(patched).ok_or_else(|| {
            SyncError::remote(
                RemoteReason::Other("malformed_response".to_string()),
                "patched event came back without a start",
            )
        })
    }

    async fn delete(&self, calendar_id: &str, event_id: &str) -> SyncResult<()> {
        let url = format!("{API_BASE}/calendars/{calendar_id}/events/{event_id}");
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| {
                SyncError::remote(RemoteReason::Other("network".to_string()), err.to_string())
            })?;

        // Already gone is as good as deleted.
        if response.status().is_success() || response.status() == StatusCode::GONE {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }
}
