//! Recurrence exception reconciliation.
//!
//! A local exception overrides one specific occurrence of a series,
//! identified by that occurrence's original time. For each series with local
//! exceptions the remote side is expanded into its materialized instances,
//! and the instances whose original time exactly matches a local anchor are
//! patched in place, addressed by the instance's own remote id.
//!
//! Local exceptions with no matching remote instance stay unrealized: the
//! create path never materializes them either. Known limitation, kept
//! deliberately.

use tracing::{debug, info, warn};

use crate::apply::{OpFailure, OpKind, SyncReport};
use crate::event::{CanonicalEvent, ExceptionGroups, RemoteEvent};
use crate::remote::RemoteCalendar;

/// A patch against one materialized instance of a series.
#[derive(Debug, Clone)]
pub struct InstancePatch {
    pub instance: RemoteEvent,
    pub exception: CanonicalEvent,
}

/// Match local exceptions against the remote instances of their series.
///
/// Matching is exact equality of the instance's original occurrence time
/// with the exception's anchor; a near miss must not match. Instances with
/// no matching anchor are left untouched. A failed expansion is reported per
/// series and the remaining series are still processed.
pub async fn match_exceptions<R: RemoteCalendar>(
    remote: &R,
    calendar_id: &str,
    exceptions: &ExceptionGroups,
    report: &mut SyncReport,
) -> Vec<InstancePatch> {
    let mut patches = Vec::new();

    for (series_id, group) in exceptions {
        let instances = match remote.list_instances(calendar_id, series_id).await {
            Ok(instances) => instances,
            Err(error) => {
                warn!(series = %series_id, %error, "series expansion failed");
                report.failures.push(OpFailure {
                    kind: OpKind::ExpandSeries,
                    event_id: series_id.clone(),
                    summary: group
                        .first()
                        .map(|e| e.summary.clone())
                        .unwrap_or_default(),
                    error,
                });
                continue;
            }
        };
        debug!(
            series = %series_id,
            instances = instances.len(),
            "expanded remote series"
        );

        for instance in instances {
            let Some(original) = instance.original_start.clone() else {
                continue;
            };
            let matched = group
                .iter()
                .find(|e| e.recurrence_anchor.as_ref() == Some(&original));
            if let Some(exception) = matched {
                info!(
                    instance = %instance.id,
                    summary = %exception.summary,
                    "instance overridden by local exception"
                );
                patches.push(InstancePatch {
                    instance,
                    exception: exception.clone(),
                });
            }
        }
    }

    patches
}
