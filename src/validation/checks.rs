//! Type-specific checks dispatched from the variant table.

use tracing::debug;

use crate::collaborators::ParticipantSummary;
use crate::config::ValidationConfig;
use crate::consent::{ConsentFile, ExtraCheck};
use crate::domain::ConsentOtherError;

/// Runs one check. An empty vector means it passed or was skipped.
pub(crate) fn run(
    check: ExtraCheck,
    file: &ConsentFile,
    summary: &ParticipantSummary,
    config: &ValidationConfig,
) -> Vec<ConsentOtherError> {
    match check {
        ExtraCheck::VersionMatch => version_match(file, summary).into_iter().collect(),
        ExtraCheck::SensitiveEhr => sensitive_ehr(file, summary, config),
        ExtraCheck::GrorConfirmation => {
            missing_check_mark(file.is_confirmation_checked()).into_iter().collect()
        }
        ExtraCheck::UpdateAgreement => {
            missing_check_mark(file.is_agreement_checked()).into_iter().collect()
        }
    }
}

fn missing_check_mark(checked: bool) -> Option<ConsentOtherError> {
    (!checked).then_some(ConsentOtherError::MissingConsentCheckMark)
}

fn version_match(file: &ConsentFile, summary: &ParticipantSummary) -> Option<ConsentOtherError> {
    match (summary.is_va_participant, file.is_va_version()) {
        (true, false) => Some(ConsentOtherError::NonVeteranConsentForVeteran),
        (false, true) => Some(ConsentOtherError::VeteranConsentForNonVeteran),
        _ => None,
    }
}

fn sensitive_ehr(
    file: &ConsentFile,
    summary: &ParticipantSummary,
    config: &ValidationConfig,
) -> Vec<ConsentOtherError> {
    if file.is_va_version() {
        return Vec::new();
    }
    let uploaded = file
        .blob()
        .updated
        .with_timezone(&config.business_timezone)
        .date_naive();
    if uploaded < config.ehr_sensitive_cutoff {
        debug!(path = %file.blob().path(), %uploaded, "EHR predates sensitive form");
        return Vec::new();
    }

    let mut errors = Vec::new();
    let is_sensitive_form = file.is_sensitive_ehr_form();

    let state = summary
        .state_of_residence
        .as_deref()
        .or(summary.state_of_care.as_deref());
    match state {
        Some(state) => {
            let expects_sensitive = config.is_sensitive_state(state);
            if expects_sensitive && !is_sensitive_form {
                errors.push(ConsentOtherError::SensitiveEhrExpected);
            } else if !expects_sensitive && is_sensitive_form {
                errors.push(ConsentOtherError::NonSensitiveEhrExpected);
            }
        }
        None => debug!(
            participant = %summary.participant_id,
            "no state on record, skipping sensitive form match"
        ),
    }

    if is_sensitive_form && !file.has_valid_sensitive_initials() {
        errors.push(ConsentOtherError::MissingSensitiveEhrInitials);
    }
    errors
}

/// Missing, blank and placeholder "null" names are invalid.
pub(crate) fn is_valid_printed_name(name: Option<&str>) -> bool {
    let Some(name) = name.map(str::trim) else {
        return false;
    };
    !name.is_empty()
        && !name.eq_ignore_ascii_case("null")
        && !name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .eq_ignore_ascii_case("null null")
}
