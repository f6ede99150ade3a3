//! Canonical event construction.
//!
//! Two-pass contract: pass one builds every non-anchored record (plain
//! events and series masters) into a map keyed by derived id; pass two
//! resolves anchored records (recurrence exceptions) against that map. The
//! explicit split means an exception never depends on where its master sits
//! in the source document.

use std::collections::HashMap;

use crate::event::{CanonicalEvent, EventTime, ExceptionGroups};
use crate::identity::derive_event_id;
use crate::source::SourceEvent;
use crate::timezone::{OutputZone, TzDefinitions, correct_time, relabel_time};

/// The canonicalised local side of one run.
#[derive(Debug, Clone, Default)]
pub struct CanonicalSet {
    /// Plain events and series masters, keyed by derived id.
    pub events: HashMap<String, CanonicalEvent>,
    /// Exceptions grouped by their series id, each group ordered by anchor.
    pub exceptions: ExceptionGroups,
}

/// Build the canonical local event set from parsed source events.
///
/// A duplicate non-exception UID silently overwrites the earlier record.
/// An exception with no summary inherits its master's; with no master in the
/// map the summary stays empty.
pub fn build_canonical_set(
    source: &[SourceEvent],
    defs: &TzDefinitions,
    zone: &OutputZone,
) -> CanonicalSet {
    let mut set = CanonicalSet::default();

    // Pass one: plain events and series masters, fully corrected.
    for event in source.iter().filter(|e| e.recurrence_anchor.is_none()) {
        let id = derive_event_id(&event.uid);
        let canonical = CanonicalEvent {
            id: id.clone(),
            summary: event.summary.clone().unwrap_or_default(),
            start: correct_time(&event.start, defs, zone),
            end: correct_time(&event.end, defs, zone),
            categories: event.categories.iter().cloned().collect(),
            recurrence: recurrence_lines(event),
            recurrence_anchor: None,
        };
        set.events.insert(id, canonical);
    }

    // Pass two: exceptions. Their clock values are taken as already being in
    // the output zone, so they are relabelled without shifting.
    for event in source.iter().filter(|e| e.recurrence_anchor.is_some()) {
        let id = derive_event_id(&event.uid);
        let summary = event.summary.clone().unwrap_or_else(|| {
            set.events
                .get(&id)
                .map(|master| master.summary.clone())
                .unwrap_or_default()
        });
        let canonical = CanonicalEvent {
            id: id.clone(),
            summary,
            start: relabel_time(&event.start, zone),
            end: relabel_time(&event.end, zone),
            categories: event.categories.iter().cloned().collect(),
            recurrence: None,
            recurrence_anchor: event
                .recurrence_anchor
                .as_ref()
                .map(|anchor| relabel_time(anchor, zone)),
        };
        set.exceptions.entry(id).or_default().push(canonical);
    }

    for group in set.exceptions.values_mut() {
        group.sort_by_key(|e| {
            e.recurrence_anchor
                .as_ref()
                .map(EventTime::ordinal)
                .unwrap_or_default()
        });
    }

    set
}

/// Concatenate recurrence properties into recurrence lines: RRULE first,
/// then EXDATE, then RDATE, source order kept within each kind. Events
/// without an RRULE get no recurrence at all.
fn recurrence_lines(event: &SourceEvent) -> Option<Vec<String>> {
    if event.rrules.is_empty() {
        return None;
    }
    let mut lines: Vec<String> = Vec::new();
    lines.extend(event.rrules.iter().map(|v| format!("RRULE:{v}")));
    lines.extend(event.exdates.iter().map(|v| format!("EXDATE:{v}")));
    lines.extend(event.rdates.iter().map(|v| format!("RDATE:{v}")));
    Some(lines)
}
