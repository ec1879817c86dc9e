use std::sync::Arc;

use tracing::info;

use super::plan::Plan;
use super::{persist, store, ResultStrategy};
use crate::collaborators::ConsentStore;
use crate::domain::{ConsentType, ParticipantId, SyncStatus, ValidationResult};
use crate::error::ConsentResult;

/// Lets a passing file take over a group that has no winner yet.
pub struct ReplacementStrategy {
    store: Arc<dyn ConsentStore>,
}

impl ReplacementStrategy {
    pub fn new(store: Arc<dyn ConsentStore>) -> Self {
        Self { store }
    }
}

impl ResultStrategy for ReplacementStrategy {
    fn name(&self) -> &str {
        "replace"
    }

    fn process(&mut self, batch: &[ValidationResult]) -> ConsentResult<Vec<i64>> {
        persist(self.store.as_ref(), batch, plan)
    }
}

pub(crate) fn plan(plan: &mut Plan, batch: &[ValidationResult]) {
    let mut keys: Vec<(ParticipantId, ConsentType)> = Vec::new();
    for result in batch {
        if !keys.contains(&result.group_key()) {
            keys.push(result.group_key());
        }
    }

    for key in keys {
        let group: Vec<&ValidationResult> = batch
            .iter()
            .filter(|result| result.group_key() == key)
            .collect();
        let winner = group
            .iter()
            .find(|result| result.sync_status == SyncStatus::ReadyForSync);

        match winner {
            Some(winner) if !plan.has_active(key) => {
                install(plan, winner);
            }
            _ => {
                for result in group {
                    store::append(plan, result);
                }
            }
        }
    }
}

/// Makes `winner` the group's active row and retires rows still waiting for
/// correction. Returns the winner's index.
pub(crate) fn install(plan: &mut Plan, winner: &ValidationResult) -> usize {
    let key = winner.group_key();
    let index = match plan.find_same_file(winner) {
        Some(index) => {
            plan.update(index, |row| {
                row.merge_from(winner);
                row.sync_status = SyncStatus::ReadyForSync;
            });
            index
        }
        None => {
            let mut row = winner.clone();
            row.id = None;
            plan.insert(row)
        }
    };
    retire_needs_correcting(plan, key, index);
    info!(participant = %key.0, consent_type = %key.1, path = ?winner.file_path,
        "consent file ready for sync");
    index
}

pub(crate) fn retire_needs_correcting(
    plan: &mut Plan,
    key: (ParticipantId, ConsentType),
    keep: usize,
) {
    for index in plan.group(key) {
        if index != keep && plan.row(index).sync_status == SyncStatus::NeedsCorrecting {
            plan.update(index, |row| row.sync_status = SyncStatus::Obsolete);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, status: SyncStatus) -> ValidationResult {
        ValidationResult {
            file_exists: true,
            file_path: Some(path.to_string()),
            is_signature_valid: status == SyncStatus::ReadyForSync,
            is_signing_date_valid: status == SyncStatus::ReadyForSync,
            sync_status: status,
            ..ValidationResult::new(ParticipantId(1), ConsentType::Primary)
        }
    }

    fn stored(id: i64, path: &str, status: SyncStatus) -> ValidationResult {
        ValidationResult {
            id: Some(id),
            ..result(path, status)
        }
    }

    #[test]
    fn test_new_winner_obsoletes_needs_correcting_rows() {
        let mut p = Plan::new(vec![
            stored(1, "b/a.pdf", SyncStatus::NeedsCorrecting),
            stored(2, "b/b.pdf", SyncStatus::NeedsCorrecting),
        ]);
        plan(&mut p, &[result("b/c.pdf", SyncStatus::ReadyForSync)]);

        let writes = p.into_writes();
        let ready: Vec<_> = writes
            .iter()
            .filter(|row| row.sync_status == SyncStatus::ReadyForSync)
            .collect();
        let obsolete = writes
            .iter()
            .filter(|row| row.sync_status == SyncStatus::Obsolete)
            .count();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, None);
        assert_eq!(obsolete, 2);
    }

    #[test]
    fn test_same_file_is_promoted_in_place() {
        let mut p = Plan::new(vec![stored(1, "b/a.pdf", SyncStatus::NeedsCorrecting)]);
        plan(&mut p, &[result("b/a.pdf", SyncStatus::ReadyForSync)]);
        let writes = p.into_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].id, Some(1));
        assert_eq!(writes[0].sync_status, SyncStatus::ReadyForSync);
        assert!(writes[0].is_signature_valid);
    }

    #[test]
    fn test_existing_winner_is_kept() {
        let mut p = Plan::new(vec![stored(1, "b/a.pdf", SyncStatus::SyncComplete)]);
        plan(
            &mut p,
            &[
                result("b/b.pdf", SyncStatus::ReadyForSync),
                result("b/c.pdf", SyncStatus::NeedsCorrecting),
            ],
        );
        let writes = p.into_writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|row| row.id.is_none()));
        assert!(writes.iter().all(|row| !row.sync_status.is_active()));
    }
}
