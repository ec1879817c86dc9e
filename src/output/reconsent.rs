use tracing::info;

use super::plan::Plan;
use crate::domain::{SyncStatus, ValidationResult};

/// A passing reconsent clears the base consent it replaces.
///
/// When a written PRIMARY_RECONSENT or EHR_RECONSENT row is ready and the
/// base group has no active row, the base row held back only for a version
/// mismatch becomes ready.
pub(crate) fn resolve(plan: &mut Plan) {
    for index in plan.dirty() {
        let row: &ValidationResult = plan.row(index);
        if row.sync_status != SyncStatus::ReadyForSync {
            continue;
        }
        let Some(base) = row.consent_type.reconsent_base() else {
            continue;
        };
        let key = (row.participant_id, base);
        if plan.has_active(key) {
            continue;
        }

        let candidate = plan.group(key).into_iter().find(|&candidate| {
            let base_row = plan.row(candidate);
            base_row.sync_status == SyncStatus::NeedsCorrecting
                && base_row.has_only_version_errors()
        });
        if let Some(candidate) = candidate {
            info!(participant = %key.0, consent_type = %base,
                "reconsent resolves version mismatch");
            plan.update(candidate, |base_row| base_row.sync_status = SyncStatus::ReadyForSync);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConsentOtherError, ConsentType, ParticipantId};
    use chrono::NaiveDate;

    fn base_row(errors: Vec<ConsentOtherError>) -> ValidationResult {
        ValidationResult {
            id: Some(1),
            file_exists: true,
            file_path: Some("b/ConsentPII.pdf".to_string()),
            is_signature_valid: true,
            signing_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            is_signing_date_valid: true,
            other_errors: errors,
            ..ValidationResult::new(ParticipantId(1), ConsentType::Primary)
        }
    }

    fn ready_reconsent() -> ValidationResult {
        ValidationResult {
            file_exists: true,
            file_path: Some("b/PrimaryReconsent.pdf".to_string()),
            sync_status: SyncStatus::ReadyForSync,
            ..ValidationResult::new(ParticipantId(1), ConsentType::PrimaryReconsent)
        }
    }

    #[test]
    fn test_promotes_version_mismatch_base_row() {
        let mut plan = Plan::new(vec![base_row(vec![
            ConsentOtherError::VeteranConsentForNonVeteran,
        ])]);
        plan.insert(ready_reconsent());
        resolve(&mut plan);
        let writes = plan.into_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].id, Some(1));
        assert_eq!(writes[0].sync_status, SyncStatus::ReadyForSync);
    }

    #[test]
    fn test_other_errors_block_promotion() {
        let mut plan = Plan::new(vec![base_row(vec![
            ConsentOtherError::VeteranConsentForNonVeteran,
            ConsentOtherError::InvalidPrintedName,
        ])]);
        plan.insert(ready_reconsent());
        resolve(&mut plan);
        assert_eq!(plan.into_writes().len(), 1);
    }
}
