//! Custom assertions for consent validation testing.
//!
//! Domain-specific assertions that make tests more readable and print the
//! offending rows when they fail.

use consent_validator::collaborators::MemoryConsentStore;
use consent_validator::{ConsentOtherError, ConsentType, ParticipantId, SyncStatus, ValidationResult};

/// Stored rows of one (participant, consent type) group, ordered by id.
pub fn group_rows(
    store: &MemoryConsentStore,
    participant: i64,
    consent_type: ConsentType,
) -> Vec<ValidationResult> {
    store
        .all_results()
        .expect("store readable")
        .into_iter()
        .filter(|row| row.group_key() == (ParticipantId(participant), consent_type))
        .collect()
}

/// Asserts that no group in the store holds more than one active row.
///
/// # Panics
/// Panics listing the group and its rows when two rows are active.
pub fn assert_single_winner(store: &MemoryConsentStore) {
    let rows = store.all_results().expect("store readable");
    for row in &rows {
        let active: Vec<&ValidationResult> = rows
            .iter()
            .filter(|other| other.group_key() == row.group_key() && other.sync_status.is_active())
            .collect();
        assert!(
            active.len() <= 1,
            "group {:?} has {} active rows: {:#?}",
            row.group_key(),
            active.len(),
            active
        );
    }
}

/// Asserts the status of a result, showing its error phrases on failure.
pub fn assert_status(result: &ValidationResult, expected: SyncStatus) {
    assert_eq!(
        result.sync_status,
        expected,
        "result for {} {} ({:?}) has problems: {:?}",
        result.participant_id,
        result.consent_type,
        result.file_path,
        result.error_phrases()
    );
}

/// Asserts that a result passed every check.
pub fn assert_ready(result: &ValidationResult) {
    assert_status(result, SyncStatus::ReadyForSync);
    assert!(result.file_exists, "file should exist: {result:#?}");
    assert!(result.other_errors.is_empty(), "unexpected errors: {:?}", result.other_errors);
}

/// Asserts that a result needs correcting because of exactly `errors`.
pub fn assert_other_errors(result: &ValidationResult, errors: &[ConsentOtherError]) {
    assert_status(result, SyncStatus::NeedsCorrecting);
    assert_eq!(
        result.other_errors, errors,
        "unexpected error set for {:?}",
        result.file_path
    );
}
