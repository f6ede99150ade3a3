//! Plan execution against the remote collaborator.
//!
//! Each operation is independent: one failure never aborts the rest. The
//! single recovery policy is the duplicate-create retry: a create rejected
//! with the "duplicate" reason is reissued exactly once with the identifier
//! cleared so the remote assigns a fresh one. Operations are issued
//! sequentially; the chosen remote interface has no batch call, and per-item
//! independence holds either way.

use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::event::CanonicalEvent;
use crate::exceptions::InstancePatch;
use crate::plan::ReconciliationPlan;
use crate::remote::RemoteCalendar;

/// What an operation was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update,
    Delete,
    /// Expanding a recurring series into its remote instances.
    ExpandSeries,
    PatchInstance,
}

/// A per-item failure, reported without aborting the run.
#[derive(Debug)]
pub struct OpFailure {
    pub kind: OpKind,
    pub event_id: String,
    pub summary: String,
    pub error: SyncError,
}

/// Outcome of one run: counts of applied operations plus per-item failures.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub instances_patched: usize,
    pub failures: Vec<OpFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply the plan. Consumes it; a plan is built once and executed once.
pub async fn apply_plan<R: RemoteCalendar>(
    remote: &R,
    calendar_id: &str,
    plan: ReconciliationPlan,
    report: &mut SyncReport,
) {
    for event in plan.to_create {
        info!(summary = %event.summary, "creating");
        match create_with_duplicate_retry(remote, calendar_id, &event).await {
            Ok(()) => report.created += 1,
            Err(error) => {
                warn!(summary = %event.summary, %error, "create failed");
                report.failures.push(OpFailure {
                    kind: OpKind::Create,
                    event_id: event.id.clone(),
                    summary: event.summary.clone(),
                    error,
                });
            }
        }
    }

    for (remote_event, event) in plan.to_update {
        info!(summary = %event.summary, "updating");
        match remote.patch(calendar_id, &remote_event.id, &event).await {
            Ok(_) => report.updated += 1,
            Err(error) => {
                warn!(summary = %event.summary, %error, "update failed");
                report.failures.push(OpFailure {
                    kind: OpKind::Update,
                    event_id: remote_event.id.clone(),
                    summary: event.summary.clone(),
                    error,
                });
            }
        }
    }

    for remote_event in plan.to_delete {
        info!(summary = %remote_event.summary, "deleting");
        match remote.delete(calendar_id, &remote_event.id).await {
            Ok(()) => report.deleted += 1,
            Err(error) => {
                warn!(summary = %remote_event.summary, %error, "delete failed");
                report.failures.push(OpFailure {
                    kind: OpKind::Delete,
                    event_id: remote_event.id.clone(),
                    summary: remote_event.summary.clone(),
                    error,
                });
            }
        }
    }
}

/// Apply the matched exception patches, after the plan proper.
pub async fn apply_instance_patches<R: RemoteCalendar>(
    remote: &R,
    calendar_id: &str,
    patches: Vec<InstancePatch>,
    report: &mut SyncReport,
) {
    for patch in patches {
        info!(
            instance = %patch.instance.id,
            summary = %patch.exception.summary,
            "patching instance"
        );
        match remote
            .patch(calendar_id, &patch.instance.id, &patch.exception)
            .await
        {
            Ok(_) => report.instances_patched += 1,
            Err(error) => {
                warn!(instance = %patch.instance.id, %error, "instance patch failed");
                report.failures.push(OpFailure {
                    kind: OpKind::PatchInstance,
                    event_id: patch.instance.id.clone(),
                    summary: patch.exception.summary.clone(),
                    error,
                });
            }
        }
    }
}

/// Create, retrying exactly once with a cleared id when the remote still
/// holds a stale record under the derived one. Any other rejection is
/// propagated for reporting.
async fn create_with_duplicate_retry<R: RemoteCalendar>(
    remote: &R,
    calendar_id: &str,
    event: &CanonicalEvent,
) -> SyncResult<()> {
    match remote.insert(calendar_id, event).await {
        Ok(_) => Ok(()),
        Err(error) if error.is_duplicate() => {
            warn!(id = %event.id, "duplicate id on create, retrying with a remote-assigned id");
            let mut retry = event.clone();
            retry.id.clear();
            remote.insert(calendar_id, &retry).await.map(|_| ())
        }
        Err(error) => Err(error),
    }
}
