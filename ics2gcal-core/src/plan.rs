//! Reconciliation planning: the three-way diff between canonical local
//! events and scanned remote events.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::event::{CanonicalEvent, RemoteEvent};

/// The operations one run will apply. Built once, consumed once, never
/// persisted. The three sequences are disjoint.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationPlan {
    pub to_create: Vec<CanonicalEvent>,
    pub to_update: Vec<(RemoteEvent, CanonicalEvent)>,
    pub to_delete: Vec<RemoteEvent>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the plan, draining `local` so each id is consumed exactly once.
///
/// Every remote event ends up matched for update, deleted, or left alone as
/// an untouched recurring instance (those are reconciled through the
/// exception path). Every local event ends up matched, created, or skipped
/// by category exclusion. A matched pair whose content already agrees is
/// consumed without queueing anything, which is what makes an unchanged
/// second run produce an empty plan.
pub fn build_plan(
    mut local: HashMap<String, CanonicalEvent>,
    remote_events: Vec<RemoteEvent>,
    exclude_categories: &HashSet<String>,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for remote in remote_events {
        match local.remove(&remote.id) {
            Some(event) => {
                if event.matches_remote(&remote) {
                    debug!(id = %remote.id, "unchanged, nothing to apply");
                } else {
                    plan.to_update.push((remote, event));
                }
            }
            None => {
                if remote.is_recurring_instance {
                    debug!(id = %remote.id, "leaving recurring instance alone");
                } else {
                    plan.to_delete.push(remote);
                }
            }
        }
    }

    // Whatever survived the drain has no remote counterpart.
    let mut remaining: Vec<CanonicalEvent> = local.into_values().collect();
    remaining.sort_by_key(|e| e.start.ordinal());
    for event in remaining {
        if event
            .categories
            .iter()
            .any(|c| exclude_categories.contains(c))
        {
            info!(summary = %event.summary, "skipped (excluded category)");
            continue;
        }
        plan.to_create.push(event);
    }

    plan
}
