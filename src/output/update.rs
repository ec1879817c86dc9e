use std::sync::Arc;

use tracing::debug;

use super::plan::Plan;
use super::{persist, replace, ResultStrategy};
use crate::collaborators::ConsentStore;
use crate::domain::{SyncStatus, ValidationResult};
use crate::error::ConsentResult;

/// Rewrites stored rows in place from a fresh check of the same file.
pub struct UpdateResultStrategy {
    store: Arc<dyn ConsentStore>,
}

impl UpdateResultStrategy {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }
}

impl ResultStrategy for UpdateResultStrategy {
    fn name(&self) -> &str {
        "update"
    }

    fn process(&mut self, batch: &[ValidationResult]) -> ConsentResult<Vec<i64>> {
        persist(self.store.as_ref(), batch, plan)
    }
}

/// Status after re-checking a stored row.
///
/// Confirmed rows only go back for correction on an explicit failure, and
/// superseded rows stay superseded unless the file now passes.
fn merged_status(stored: SyncStatus, checked: SyncStatus) -> SyncStatus {
    match (stored, checked) {
        (SyncStatus::Obsolete, SyncStatus::ReadyForSync) => SyncStatus::ReadyForSync,
        (SyncStatus::Obsolete, _) => SyncStatus::Obsolete,
        (_, SyncStatus::NeedsCorrecting) => SyncStatus::NeedsCorrecting,
        (SyncStatus::SyncComplete, _) => SyncStatus::SyncComplete,
        (_, checked) => checked,
    }
}

pub(crate) fn plan(plan: &mut Plan, batch: &[ValidationResult]) {
    let mut unmatched = Vec::new();

    for result in batch {
        let matched = result
            .file_path
            .as_ref()
            .and_then(|_| plan.find_same_file(result));
        let Some(index) = matched else {
            unmatched.push(result.clone());
            continue;
        };

        let stored = plan.row(index).sync_status;
        let key = result.group_key();
        if !result.file_exists && stored.is_active() {
            debug!(path = ?result.file_path, "file unreadable now, keeping confirmed row");
            continue;
        }

        let mut status = merged_status(stored, result.sync_status);
        if status.is_active() && plan.other_active(key, index).is_some() {
            status = SyncStatus::Obsolete;
        }
        plan.update(index, |row| {
            row.merge_from(result);
            row.sync_status = status;
        });
        if status == SyncStatus::ReadyForSync && !stored.is_active() {
            replace::retire_needs_correcting(plan, key, index);
        }
    }

    replace::plan(plan, &unmatched);
}
