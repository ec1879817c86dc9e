//! The validation-result record and its error taxonomy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ConsentType, ParticipantId, SyncStatus};

/// Problems found on a consent file beyond signature and date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsentOtherError {
    MissingConsentCheckMark,
    InvalidPrintedName,
    NonVeteranConsentForVeteran,
    VeteranConsentForNonVeteran,
    SensitiveEhrExpected,
    NonSensitiveEhrExpected,
    MissingSensitiveEhrInitials,
    /// Codes written by older runs that this build no longer produces.
    Other(String),
}

impl ConsentOtherError {
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingConsentCheckMark => "missing consent check mark",
            Self::InvalidPrintedName => "invalid printed name",
            Self::NonVeteranConsentForVeteran => "non-veteran consent for veteran participant",
            Self::VeteranConsentForNonVeteran => "veteran consent for non-veteran participant",
            Self::SensitiveEhrExpected => "sensitive ehr form expected",
            Self::NonSensitiveEhrExpected => "non-sensitive ehr form expected",
            Self::MissingSensitiveEhrInitials => "missing sensitive ehr initials",
            Self::Other(code) => code,
        }
    }

    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            self,
            Self::NonVeteranConsentForVeteran | Self::VeteranConsentForNonVeteran
        )
    }
}

impl From<String> for ConsentOtherError {
    fn from(value: String) -> Self {
        const KNOWN: [ConsentOtherError; 7] = [
            ConsentOtherError::MissingConsentCheckMark,
            ConsentOtherError::InvalidPrintedName,
            ConsentOtherError::NonVeteranConsentForVeteran,
            ConsentOtherError::VeteranConsentForNonVeteran,
            ConsentOtherError::SensitiveEhrExpected,
            ConsentOtherError::NonSensitiveEhrExpected,
            ConsentOtherError::MissingSensitiveEhrInitials,
        ];
        let trimmed = value.trim();
        KNOWN
            .into_iter()
            .find(|known| known.as_str() == trimmed)
            .unwrap_or_else(|| Self::Other(trimmed.to_string()))
    }
}

impl From<ConsentOtherError> for String {
    fn from(value: ConsentOtherError) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ConsentOtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per physical file, or per "missing file" assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: Option<i64>,
    pub participant_id: ParticipantId,
    pub consent_type: ConsentType,
    pub file_exists: bool,
    pub file_path: Option<String>,
    pub file_upload_time: Option<DateTime<Utc>>,
    pub signature_str: Option<String>,
    pub is_signature_valid: bool,
    pub is_signature_image: bool,
    pub signing_date: Option<NaiveDate>,
    pub is_signing_date_valid: bool,
    pub expected_sign_date: Option<NaiveDate>,
    pub printed_name: Option<String>,
    pub other_errors: Vec<ConsentOtherError>,
    pub sync_status: SyncStatus,
    pub consent_response_id: Option<i64>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ValidationResult {
    /// Blank, unsaved record for a group. Starts as needing correction.
    pub fn new(participant_id: ParticipantId, consent_type: ConsentType) -> Self {
        Self {
            id: None,
            participant_id,
            consent_type,
            file_exists: false,
            file_path: None,
            file_upload_time: None,
            signature_str: None,
            is_signature_valid: false,
            is_signature_image: false,
            signing_date: None,
            is_signing_date_valid: false,
            expected_sign_date: None,
            printed_name: None,
            other_errors: Vec::new(),
            sync_status: SyncStatus::NeedsCorrecting,
            consent_response_id: None,
            last_checked: None,
        }
    }

    /// Assertion that no file of the type could be found.
    pub fn missing_file(
        participant_id: ParticipantId,
        consent_type: ConsentType,
        expected_sign_date: Option<NaiveDate>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expected_sign_date,
            last_checked: Some(checked_at),
            ..Self::new(participant_id, consent_type)
        }
    }

    pub fn group_key(&self) -> (ParticipantId, ConsentType) {
        (self.participant_id, self.consent_type)
    }

    /// Both rows describe the same physical file (or both assert the same
    /// group's file is missing).
    pub fn same_file(&self, other: &ValidationResult) -> bool {
        self.group_key() == other.group_key() && self.file_path == other.file_path
    }

    /// Storage form of `other_errors`.
    pub fn other_errors_column(&self) -> Option<String> {
        if self.other_errors.is_empty() {
            return None;
        }
        Some(
            self.other_errors
                .iter()
                .map(ConsentOtherError::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn parse_other_errors(column: &str) -> Vec<ConsentOtherError> {
        column
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(|code| ConsentOtherError::from(code.to_string()))
            .collect()
    }

    /// Signature and date pass and the only recorded problems are version
    /// mismatches. A later reconsent clears exactly this kind of file.
    pub fn has_only_version_errors(&self) -> bool {
        self.file_exists
            && self.is_signature_valid
            && self.is_signing_date_valid
            && !self.other_errors.is_empty()
            && self.other_errors.iter().all(ConsentOtherError::is_version_mismatch)
    }

    /// Human readable problems, in report order.
    pub fn error_phrases(&self) -> Vec<String> {
        if !self.file_exists {
            return vec!["missing file".to_string()];
        }
        let mut phrases = Vec::new();
        if !self.is_signature_valid {
            phrases.push("missing signature".to_string());
        }
        if self.signing_date.is_none() {
            phrases.push("missing signing date".to_string());
        } else if !self.is_signing_date_valid {
            phrases.push("invalid signing date".to_string());
        }
        phrases.extend(self.other_errors.iter().map(ToString::to_string));
        phrases
    }

    /// Copies everything a validation run determines onto `self`, keeping
    /// identity and submission linkage.
    pub fn merge_from(&mut self, newer: &ValidationResult) {
        self.file_exists = newer.file_exists;
        self.file_upload_time = newer.file_upload_time;
        self.signature_str = newer.signature_str.clone();
        self.is_signature_valid = newer.is_signature_valid;
        self.is_signature_image = newer.is_signature_image;
        self.signing_date = newer.signing_date;
        self.is_signing_date_valid = newer.is_signing_date_valid;
        self.expected_sign_date = newer.expected_sign_date.or(self.expected_sign_date);
        self.printed_name = newer.printed_name.clone();
        self.other_errors = newer.other_errors.clone();
        self.last_checked = newer.last_checked;
        if newer.consent_response_id.is_some() {
            self.consent_response_id = newer.consent_response_id;
        }
    }
}
