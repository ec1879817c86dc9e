use std::sync::Arc;

use tracing::debug;

use super::plan::Plan;
use super::{persist, ResultStrategy};
use crate::collaborators::ConsentStore;
use crate::domain::{SyncStatus, ValidationResult};
use crate::error::ConsentResult;

/// Appends new results, skipping ones already on record.
pub struct StoreResultStrategy {
    store: Arc<dyn ConsentStore>,
}

impl StoreResultStrategy {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }
}

impl ResultStrategy for StoreResultStrategy {
    fn name(&self) -> &str {
        "store"
    }

    fn process(&mut self, batch: &[ValidationResult]) -> ConsentResult<Vec<i64>> {
        persist(self.store.as_ref(), batch, plan)
    }
}

pub(crate) fn plan(plan: &mut Plan, batch: &[ValidationResult]) {
    for result in batch {
        append(plan, result);
    }
}

/// Adds `result` as a new row unless it duplicates one.
///
/// A missing-file report never displaces an active row, and a passing
/// result arriving after the group already has an active row is recorded
/// as obsolete. A real file supersedes earlier missing-file rows.
pub(crate) fn append(plan: &mut Plan, result: &ValidationResult) {
    let key = result.group_key();
    if plan.find_same_file(result).is_some() {
        debug!(participant = %result.participant_id, consent_type = %result.consent_type,
            path = ?result.file_path, "result already on record");
        return;
    }
    let group_has_active = plan.has_active(key);
    if !result.file_exists && group_has_active {
        debug!(participant = %result.participant_id, consent_type = %result.consent_type,
            "ignoring missing-file result for a group with an active row");
        return;
    }

    let mut row = result.clone();
    row.id = None;
    if row.sync_status.is_active() && group_has_active {
        row.sync_status = SyncStatus::Obsolete;
    }

    if row.file_exists {
        for index in plan.group(key) {
            let stale = plan.row(index);
            if !stale.file_exists && stale.sync_status == SyncStatus::NeedsCorrecting {
                plan.update(index, |stale| stale.sync_status = SyncStatus::Obsolete);
            }
        }
    }
    plan.insert(row);
}
