//! End-to-end engine tests against an in-memory remote collaborator.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use chrono::{FixedOffset, TimeZone};

use ics2gcal_core::apply::{OpKind, apply_instance_patches, apply_plan};
use ics2gcal_core::config::SyncConfig;
use ics2gcal_core::error::{RemoteReason, SyncError, SyncResult};
use ics2gcal_core::event::{CanonicalEvent, EventTime, RemoteCalendarInfo, RemoteEvent};
use ics2gcal_core::exceptions::match_exceptions;
use ics2gcal_core::plan::{ReconciliationPlan, build_plan};
use ics2gcal_core::remote::{EventPage, RemoteCalendar, scan_events};
use ics2gcal_core::source::parse_document;
use ics2gcal_core::sync::run_sync;
use ics2gcal_core::window::SyncWindow;
use ics2gcal_core::SyncReport;

#[derive(Default)]
struct MockState {
    /// Pages served in order by `list_events`; empty means an empty final
    /// page.
    pages: Vec<EventPage>,
    /// Instances returned by `list_instances`, per series id.
    instances: HashMap<String, Vec<RemoteEvent>>,
    /// Series ids whose `list_instances` expansion fails.
    failing_series: HashSet<String>,
    /// Ids rejected once per attempt with the "duplicate" reason.
    duplicate_ids: HashSet<String>,
    /// Ids rejected with a non-duplicate reason.
    rejected_ids: HashSet<String>,

    /// Submitted insert ids, in call order.
    insert_attempts: Vec<String>,
    created: Vec<CanonicalEvent>,
    patched: Vec<(String, CanonicalEvent)>,
    deleted: Vec<String>,
    /// Page tokens seen by `list_events`, in call order.
    listed_tokens: Vec<Option<String>>,
}

#[derive(Default)]
struct MockRemote {
    calendars: Vec<RemoteCalendarInfo>,
    state: Mutex<MockState>,
}

impl MockRemote {
    fn with_calendar(name: &str) -> Self {
        MockRemote {
            calendars: vec![RemoteCalendarInfo {
                id: "cal-1".to_string(),
                display_name: name.to_string(),
            }],
            state: Mutex::default(),
        }
    }
}

impl RemoteCalendar for MockRemote {
    async fn list_calendars(&self) -> SyncResult<Vec<RemoteCalendarInfo>> {
        Ok(self.calendars.clone())
    }

    async fn list_events(
        &self,
        _calendar_id: &str,
        _window: &SyncWindow,
        page_token: Option<&str>,
    ) -> SyncResult<EventPage> {
        let mut state = self.state.lock().unwrap();
        state.listed_tokens.push(page_token.map(str::to_string));
        if state.pages.is_empty() {
            return Ok(EventPage {
                events: Vec::new(),
                next_page_token: None,
            });
        }
        Ok(state.pages.remove(0))
    }

    async fn list_instances(
        &self,
        _calendar_id: &str,
        series_id: &str,
    ) -> SyncResult<Vec<RemoteEvent>> {
        let state = self.state.lock().unwrap();
        if state.failing_series.contains(series_id) {
            return Err(SyncError::remote(
                RemoteReason::Other("backendError".to_string()),
                "expansion rejected",
            ));
        }
        Ok(state.instances.get(series_id).cloned().unwrap_or_default())
    }

    async fn insert(&self, _calendar_id: &str, event: &CanonicalEvent) -> SyncResult<RemoteEvent> {
        let mut state = self.state.lock().unwrap();
        state.insert_attempts.push(event.id.clone());
        if state.duplicate_ids.contains(&event.id) {
            return Err(SyncError::remote(
                RemoteReason::Duplicate,
                "The requested identifier already exists",
            ));
        }
        if state.rejected_ids.contains(&event.id) {
            return Err(SyncError::remote(
                RemoteReason::Other("backendError".to_string()),
                "transient backend error",
            ));
        }
        state.created.push(event.clone());
        Ok(remote_mirror(event))
    }

    async fn patch(
        &self,
        _calendar_id: &str,
        event_id: &str,
        event: &CanonicalEvent,
    ) -> SyncResult<RemoteEvent> {
        let mut state = self.state.lock().unwrap();
        state.patched.push((event_id.to_string(), event.clone()));
        Ok(remote_mirror(event))
    }

    async fn delete(&self, _calendar_id: &str, event_id: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(event_id.to_string());
        Ok(())
    }
}

fn jst(d: u32, h: u32) -> EventTime {
    EventTime::DateTime(
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, d, h, 0, 0)
            .unwrap(),
    )
}

fn jst_secs(d: u32, h: u32, s: u32) -> EventTime {
    EventTime::DateTime(
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, d, h, 0, s)
            .unwrap(),
    )
}

fn canonical(id: &str, summary: &str, start: EventTime, end: EventTime) -> CanonicalEvent {
    CanonicalEvent {
        id: id.to_string(),
        summary: summary.to_string(),
        start,
        end,
        categories: Default::default(),
        recurrence: None,
        recurrence_anchor: None,
    }
}

fn remote_event(id: &str, summary: &str, start: EventTime, end: EventTime) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        summary: summary.to_string(),
        start,
        end,
        recurrence: None,
        is_recurring_instance: false,
        series_id: None,
        original_start: None,
    }
}

/// What the remote would hold after storing the canonical event.
fn remote_mirror(event: &CanonicalEvent) -> RemoteEvent {
    let id = if event.id.is_empty() {
        "assigned-1".to_string()
    } else {
        event.id.clone()
    };
    RemoteEvent {
        id,
        summary: event.summary.clone(),
        start: event.start.clone(),
        end: event.end.clone(),
        recurrence: event.recurrence.clone(),
        is_recurring_instance: false,
        series_id: None,
        original_start: None,
    }
}

#[tokio::test]
async fn scan_follows_pagination_to_the_last_page() {
    let remote = MockRemote::with_calendar("Work");
    {
        let mut state = remote.state.lock().unwrap();
        state.pages = vec![
            EventPage {
                events: vec![remote_event("a", "A", jst(1, 9), jst(1, 10))],
                next_page_token: Some("p2".to_string()),
            },
            EventPage {
                events: vec![
                    remote_event("b", "B", jst(2, 9), jst(2, 10)),
                    remote_event("c", "C", jst(3, 9), jst(3, 10)),
                ],
                next_page_token: Some("p3".to_string()),
            },
            EventPage {
                events: vec![remote_event("d", "D", jst(4, 9), jst(4, 10))],
                next_page_token: None,
            },
        ];
    }

    let events = scan_events(&remote, "cal-1", &SyncWindow::default())
        .await
        .unwrap();

    assert_eq!(events.len(), 4);
    let state = remote.state.lock().unwrap();
    assert_eq!(
        state.listed_tokens,
        [None, Some("p2".to_string()), Some("p3".to_string())]
    );
}

#[tokio::test]
async fn duplicate_create_is_retried_once_with_cleared_id() {
    let remote = MockRemote::with_calendar("Work");
    remote
        .state
        .lock()
        .unwrap()
        .duplicate_ids
        .insert("x1".to_string());

    let plan = ReconciliationPlan {
        to_create: vec![canonical("x1", "Dentist", jst(1, 10), jst(1, 11))],
        ..Default::default()
    };
    let mut report = SyncReport::default();
    apply_plan(&remote, "cal-1", plan, &mut report).await;

    let state = remote.state.lock().unwrap();
    // First attempt with the derived id, second with the id cleared.
    assert_eq!(state.insert_attempts, ["x1", ""]);
    assert_eq!(report.created, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn non_duplicate_create_failure_is_reported_not_retried() {
    let remote = MockRemote::with_calendar("Work");
    remote
        .state
        .lock()
        .unwrap()
        .rejected_ids
        .insert("x1".to_string());

    let plan = ReconciliationPlan {
        to_create: vec![
            canonical("x1", "Rejected", jst(1, 10), jst(1, 11)),
            canonical("x2", "Fine", jst(2, 10), jst(2, 11)),
        ],
        ..Default::default()
    };
    let mut report = SyncReport::default();
    apply_plan(&remote, "cal-1", plan, &mut report).await;

    let state = remote.state.lock().unwrap();
    // No retry for x1, and its failure does not block x2.
    assert_eq!(state.insert_attempts, ["x1", "x2"]);
    assert_eq!(report.created, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, OpKind::Create);
    assert_eq!(report.failures[0].event_id, "x1");
}

#[tokio::test]
async fn exception_patches_only_the_exact_anchor() {
    let remote = MockRemote::with_calendar("Work");
    {
        let mut state = remote.state.lock().unwrap();
        state.instances.insert(
            "s1".to_string(),
            vec![
                RemoteEvent {
                    is_recurring_instance: true,
                    series_id: Some("s1".to_string()),
                    original_start: Some(jst(10, 9)),
                    ..remote_event("s1_20240310", "Standup", jst(10, 9), jst(10, 10))
                },
                RemoteEvent {
                    is_recurring_instance: true,
                    series_id: Some("s1".to_string()),
                    original_start: Some(jst(17, 9)),
                    ..remote_event("s1_20240317", "Standup", jst(17, 9), jst(17, 10))
                },
                // One second off the anchor: must not match.
                RemoteEvent {
                    is_recurring_instance: true,
                    series_id: Some("s1".to_string()),
                    original_start: Some(jst_secs(10, 9, 1)),
                    ..remote_event("s1_offbyone", "Standup", jst(10, 9), jst(10, 10))
                },
            ],
        );
    }

    let mut exception = canonical("s1", "Standup (moved)", jst(10, 14), jst(10, 15));
    exception.recurrence_anchor = Some(jst(10, 9));
    let mut groups = BTreeMap::new();
    groups.insert("s1".to_string(), vec![exception]);

    let mut report = SyncReport::default();
    let patches = match_exceptions(&remote, "cal-1", &groups, &mut report).await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].instance.id, "s1_20240310");

    apply_instance_patches(&remote, "cal-1", patches, &mut report).await;
    assert_eq!(report.instances_patched, 1);
    assert!(report.is_clean());

    let state = remote.state.lock().unwrap();
    assert_eq!(state.patched.len(), 1);
    assert_eq!(state.patched[0].0, "s1_20240310");
    assert_eq!(state.patched[0].1.summary, "Standup (moved)");
}

#[tokio::test]
async fn failed_series_expansion_is_reported_and_skipped() {
    let remote = MockRemote::with_calendar("Work");
    {
        let mut state = remote.state.lock().unwrap();
        state.failing_series.insert("a-broken".to_string());
        state.instances.insert(
            "b-fine".to_string(),
            vec![RemoteEvent {
                is_recurring_instance: true,
                series_id: Some("b-fine".to_string()),
                original_start: Some(jst(10, 9)),
                ..remote_event("b-fine_20240310", "Review", jst(10, 9), jst(10, 10))
            }],
        );
    }

    let mut broken = canonical("a-broken", "Planning (moved)", jst(12, 14), jst(12, 15));
    broken.recurrence_anchor = Some(jst(12, 9));
    let mut fine = canonical("b-fine", "Review (moved)", jst(10, 14), jst(10, 15));
    fine.recurrence_anchor = Some(jst(10, 9));
    let mut groups = BTreeMap::new();
    groups.insert("a-broken".to_string(), vec![broken]);
    groups.insert("b-fine".to_string(), vec![fine]);

    let mut report = SyncReport::default();
    let patches = match_exceptions(&remote, "cal-1", &groups, &mut report).await;

    // The broken series lands in the failures and the other one still
    // produces its patch.
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].instance.id, "b-fine_20240310");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, OpKind::ExpandSeries);
    assert_eq!(report.failures[0].event_id, "a-broken");
}

#[tokio::test]
async fn changed_recurrence_rule_is_patched_through() {
    let remote = MockRemote::with_calendar("Work");
    let config = SyncConfig::new("Work");
    let document = parse_document(SAMPLE_ICS).unwrap();

    // The remote holds the master under its derived id with the same summary
    // and times but an older weekly-on-Friday rule.
    let master_id = ics2gcal_core::identity::derive_event_id("series-1");
    {
        let mut state = remote.state.lock().unwrap();
        let master_end = EventTime::DateTime(
            FixedOffset::east_opt(9 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 4, 9, 15, 0)
                .unwrap(),
        );
        let mut stored = remote_event(&master_id, "Standup", jst(4, 9), master_end);
        stored.recurrence = Some(vec!["RRULE:FREQ=WEEKLY;BYDAY=FR".to_string()]);
        state.pages = vec![EventPage {
            events: vec![stored],
            next_page_token: None,
        }];
    }

    let report = run_sync(&remote, &config, &document).await.unwrap();
    assert_eq!(report.updated, 1);

    let state = remote.state.lock().unwrap();
    let (patched_id, patched) = state
        .patched
        .iter()
        .find(|(_, e)| e.summary == "Standup")
        .unwrap();
    assert_eq!(*patched_id, master_id);
    assert_eq!(
        patched.recurrence,
        Some(vec!["RRULE:FREQ=WEEKLY;BYDAY=MO".to_string()])
    );
}

#[tokio::test]
async fn unknown_calendar_name_is_fatal() {
    let remote = MockRemote::with_calendar("Work");
    let config = SyncConfig::new("Personal");
    let document = parse_document(SAMPLE_ICS).unwrap();

    let result = run_sync(&remote, &config, &document).await;
    assert!(matches!(result, Err(SyncError::CalendarNotFound(_))));
    // Fatal before any plan work: nothing was written.
    let state = remote.state.lock().unwrap();
    assert!(state.insert_attempts.is_empty() && state.deleted.is_empty());
}

const SAMPLE_ICS: &str = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VTIMEZONE
TZID:America/New_York
BEGIN:STANDARD
DTSTART:20071104T020000
TZOFFSETFROM:-0400
TZOFFSETTO:-0500
END:STANDARD
END:VTIMEZONE
BEGIN:VEVENT
UID:plain-1
SUMMARY:Dentist
DTSTART;TZID=America/New_York:20240301T100000
DTEND;TZID=America/New_York:20240301T110000
END:VEVENT
BEGIN:VEVENT
UID:series-1
SUMMARY:Standup
DTSTART:20240304T090000
DTEND:20240304T091500
RRULE:FREQ=WEEKLY;BYDAY=MO
END:VEVENT
BEGIN:VEVENT
UID:series-1
SUMMARY:Standup (moved)
DTSTART:20240310T140000
DTEND:20240310T150000
RECURRENCE-ID:20240310T090000
END:VEVENT
END:VCALENDAR"#;

#[tokio::test]
async fn full_run_creates_deletes_and_patches() {
    let remote = MockRemote::with_calendar("Work");
    {
        let mut state = remote.state.lock().unwrap();
        state.pages = vec![EventPage {
            events: vec![remote_event("stale", "Removed locally", jst(5, 9), jst(5, 10))],
            next_page_token: None,
        }];
        state.instances.insert(
            ics2gcal_core::identity::derive_event_id("series-1"),
            vec![RemoteEvent {
                is_recurring_instance: true,
                series_id: Some("s1".to_string()),
                original_start: Some(jst(10, 9)),
                ..remote_event("inst-1", "Standup", jst(10, 9), jst(10, 10))
            }],
        );
    }

    let config = SyncConfig::new("Work");
    let document = parse_document(SAMPLE_ICS).unwrap();
    let report = run_sync(&remote, &config, &document).await.unwrap();

    // plain-1 and the series master are created, the stale remote event is
    // deleted, and the overridden instance is patched.
    assert_eq!(report.created, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.instances_patched, 1);
    assert_eq!(report.updated, 0);
    assert!(report.is_clean());

    let state = remote.state.lock().unwrap();
    assert_eq!(state.deleted, ["stale"]);
    assert_eq!(state.patched.len(), 1);
    assert_eq!(state.patched[0].0, "inst-1");

    // The zoned event was corrected into the output zone: 10:00 in New York
    // is midnight the next day in Tokyo.
    let dentist = state
        .created
        .iter()
        .find(|e| e.summary == "Dentist")
        .unwrap();
    match &dentist.start {
        EventTime::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2024-03-02T00:00:00+09:00"),
        other => panic!("expected DateTime, got {other:?}"),
    }
}

#[tokio::test]
async fn second_run_with_unchanged_source_produces_empty_plan() {
    // First run against an empty remote.
    let first = MockRemote::with_calendar("Work");
    let config = SyncConfig::new("Work");
    let document = parse_document(SAMPLE_ICS).unwrap();
    let report = run_sync(&first, &config, &document).await.unwrap();
    assert_eq!(report.created, 2);

    // Second run: the remote now reflects everything the first run created.
    let created = first.state.lock().unwrap().created.clone();
    let second = MockRemote::with_calendar("Work");
    second.state.lock().unwrap().pages = vec![EventPage {
        events: created.iter().map(remote_mirror).collect(),
        next_page_token: None,
    }];

    let report = run_sync(&second, &config, &document).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.deleted, 0);
    assert!(report.is_clean());

    let state = second.state.lock().unwrap();
    assert!(state.insert_attempts.is_empty() && state.deleted.is_empty());
}

#[tokio::test]
async fn update_and_delete_failures_do_not_stop_the_run() {
    struct FlakyRemote {
        inner: MockRemote,
    }

    impl RemoteCalendar for FlakyRemote {
        async fn list_calendars(&self) -> SyncResult<Vec<RemoteCalendarInfo>> {
            self.inner.list_calendars().await
        }
        async fn list_events(
            &self,
            calendar_id: &str,
            window: &SyncWindow,
            page_token: Option<&str>,
        ) -> SyncResult<EventPage> {
            self.inner.list_events(calendar_id, window, page_token).await
        }
        async fn list_instances(
            &self,
            calendar_id: &str,
            series_id: &str,
        ) -> SyncResult<Vec<RemoteEvent>> {
            self.inner.list_instances(calendar_id, series_id).await
        }
        async fn insert(
            &self,
            calendar_id: &str,
            event: &CanonicalEvent,
        ) -> SyncResult<RemoteEvent> {
            self.inner.insert(calendar_id, event).await
        }
        async fn patch(
            &self,
            _calendar_id: &str,
            _event_id: &str,
            _event: &CanonicalEvent,
        ) -> SyncResult<RemoteEvent> {
            Err(SyncError::remote(
                RemoteReason::Other("backendError".to_string()),
                "patch rejected",
            ))
        }
        async fn delete(&self, _calendar_id: &str, _event_id: &str) -> SyncResult<()> {
            Err(SyncError::remote(
                RemoteReason::Other("backendError".to_string()),
                "delete rejected",
            ))
        }
    }

    let remote = FlakyRemote {
        inner: MockRemote::with_calendar("Work"),
    };

    let plan = ReconciliationPlan {
        to_create: vec![canonical("new", "Fresh", jst(1, 10), jst(1, 11))],
        to_update: vec![(
            remote_event("u1", "Old", jst(2, 10), jst(2, 11)),
            canonical("u1", "New", jst(2, 10), jst(2, 11)),
        )],
        to_delete: vec![remote_event("d1", "Stale", jst(3, 10), jst(3, 11))],
    };
    let mut report = SyncReport::default();
    apply_plan(&remote, "cal-1", plan, &mut report).await;

    // The create still lands even though update and delete both fail.
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.failures.len(), 2);
    let kinds: Vec<OpKind> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, [OpKind::Update, OpKind::Delete]);
}

#[tokio::test]
async fn planner_consumes_each_local_id_exactly_once() {
    // Two remote records with the same id: the second lookup finds the local
    // map already drained and falls through to deletion.
    let locals: HashMap<String, CanonicalEvent> = [(
        "dup".to_string(),
        canonical("dup", "Once", jst(1, 10), jst(1, 11)),
    )]
    .into_iter()
    .collect();
    let remotes = vec![
        remote_event("dup", "Once", jst(1, 10), jst(1, 11)),
        remote_event("dup", "Shadow copy", jst(1, 10), jst(1, 11)),
    ];

    let plan = build_plan(locals, remotes, &HashSet::new());
    assert!(plan.to_create.is_empty());
    assert!(plan.to_update.is_empty());
    assert_eq!(plan.to_delete.len(), 1);
}
