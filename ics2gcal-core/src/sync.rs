//! Full run orchestration.
//!
//! Resolve the target calendar, canonicalise the source document, scan the
//! remote window, plan, apply, then reconcile exception instances. Fatal
//! conditions abort before any plan work; per-item failures land in the
//! report and the run continues.

use tracing::info;

use crate::apply::{SyncReport, apply_instance_patches, apply_plan};
use crate::canonical::{CanonicalSet, build_canonical_set};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::exceptions::match_exceptions;
use crate::plan::build_plan;
use crate::remote::{RemoteCalendar, find_calendar_id, scan_events};
use crate::source::SourceDocument;
use crate::timezone::OutputZone;
use crate::window::SyncWindow;

pub async fn run_sync<R: RemoteCalendar>(
    remote: &R,
    config: &SyncConfig,
    document: &SourceDocument,
) -> SyncResult<SyncReport> {
    let zone = OutputZone::resolve(&config.time_zone)?;
    let calendar_id = find_calendar_id(remote, &config.calendar_name).await?;
    let window = SyncWindow::around_now(config.window_days);

    let CanonicalSet { events, exceptions } =
        build_canonical_set(&document.events, &document.tz_definitions, &zone);
    info!(
        events = events.len(),
        exception_series = exceptions.len(),
        "canonicalised source document"
    );

    let remote_events = scan_events(remote, &calendar_id, &window).await?;
    info!(remote = remote_events.len(), "scanned remote window");

    let plan = build_plan(events, remote_events, &config.exclude_categories);
    info!(
        create = plan.to_create.len(),
        update = plan.to_update.len(),
        delete = plan.to_delete.len(),
        "reconciliation plan ready"
    );

    let mut report = SyncReport::default();
    apply_plan(remote, &calendar_id, plan, &mut report).await;

    let patches = match_exceptions(remote, &calendar_id, &exceptions, &mut report).await;
    apply_instance_patches(remote, &calendar_id, patches, &mut report).await;

    Ok(report)
}
