//! Extraction plus business checks for one participant and consent type.

mod checks;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::collaborators::{split_file_path, BlobStore, ParticipantFacts, ParticipantSummary};
use crate::config::ValidationConfig;
use crate::consent::{ConsentFile, ConsentFileFactory, Signature};
use crate::domain::{
    ConsentOtherError, ConsentType, ParticipantId, SyncStatus, ValidationResult,
};
use crate::error::{ConsentError, ConsentResult};

/// Source of "now", replaceable so repeated runs produce identical rows.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Validates a participant's consent files.
///
/// Produces one [`ValidationResult`] per physical file of the requested type,
/// or a single `file_exists = false` result when there are none. Results are
/// not persisted here; feed them to an output strategy.
pub struct ConsentValidator {
    blobs: Arc<dyn BlobStore>,
    facts: Arc<dyn ParticipantFacts>,
    config: ValidationConfig,
    clock: Clock,
}

impl fmt::Debug for ConsentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsentValidator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        facts: Arc<dyn ParticipantFacts>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            blobs,
            facts,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Calendar date of `timestamp` in the business timezone.
    pub fn expected_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp
            .with_timezone(&self.config.business_timezone)
            .date_naive()
    }

    /// Validates every file of `consent_type`. Without `expected_signing_time`
    /// the type's authored timestamp from participant facts is used.
    ///
    /// # Errors
    /// `InvalidInput` when the participant has no facts on record, `BlobStore`
    /// when uploads cannot be listed or downloaded.
    pub fn validate(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
        expected_signing_time: Option<DateTime<Utc>>,
    ) -> ConsentResult<Vec<ValidationResult>> {
        let summary = self.summary(participant_id)?;
        let expected = expected_signing_time
            .or_else(|| summary.authored.get(&consent_type).copied())
            .map(|timestamp| self.expected_date(timestamp));
        self.validate_group(&summary, consent_type, expected)
    }

    /// Like [`validate`](Self::validate) with an already converted expected
    /// date, as stored on existing rows.
    pub fn validate_expecting(
        &self,
        participant_id: ParticipantId,
        consent_type: ConsentType,
        expected: Option<NaiveDate>,
    ) -> ConsentResult<Vec<ValidationResult>> {
        let summary = self.summary(participant_id)?;
        self.validate_group(&summary, consent_type, expected)
    }

    /// Re-checks a stored row against its file as it is now.
    ///
    /// Rows asserting a missing file rerun the whole group. A file that has
    /// since disappeared comes back as `file_exists = false` with its path
    /// kept, so it still matches the stored row.
    pub fn revalidate(&self, existing: &ValidationResult) -> ConsentResult<Vec<ValidationResult>> {
        let summary = self.summary(existing.participant_id)?;
        let Some(path) = existing.file_path.as_deref() else {
            return self.validate_group(
                &summary,
                existing.consent_type,
                existing.expected_sign_date,
            );
        };
        let (bucket, name) = split_file_path(path).ok_or_else(|| ConsentError::InvalidInput {
            parameter: "file_path".to_string(),
            reason: format!("'{path}' is not <bucket>/<name>"),
        })?;
        let source = self
            .config
            .source_for_bucket(bucket)
            .unwrap_or(summary.upload_source);

        let factory = ConsentFileFactory::new(self.blobs.as_ref(), &self.config);
        match factory.load_file(bucket, name, source, existing.consent_type)? {
            Some(file) => Ok(vec![self.evaluate(
                &summary,
                &file,
                existing.expected_sign_date,
            )]),
            None => {
                info!(path, "previously validated file has disappeared");
                let mut gone = ValidationResult::missing_file(
                    existing.participant_id,
                    existing.consent_type,
                    existing.expected_sign_date,
                    (self.clock)(),
                );
                gone.file_path = Some(path.to_string());
                Ok(vec![gone])
            }
        }
    }

    fn summary(&self, participant_id: ParticipantId) -> ConsentResult<ParticipantSummary> {
        self.facts
            .summary(participant_id)?
            .ok_or_else(|| ConsentError::InvalidInput {
                parameter: "participant_id".to_string(),
                reason: format!("no participant facts for {participant_id}"),
            })
    }

    fn validate_group(
        &self,
        summary: &ParticipantSummary,
        consent_type: ConsentType,
        expected: Option<NaiveDate>,
    ) -> ConsentResult<Vec<ValidationResult>> {
        let factory = ConsentFileFactory::new(self.blobs.as_ref(), &self.config);
        let files = factory.list_files(
            summary.participant_id,
            summary.upload_source,
            Some(consent_type),
        )?;

        if files.is_empty() {
            debug!(
                participant = %summary.participant_id,
                %consent_type,
                "no consent file found"
            );
            return Ok(vec![ValidationResult::missing_file(
                summary.participant_id,
                consent_type,
                expected,
                (self.clock)(),
            )]);
        }

        Ok(files
            .iter()
            .map(|file| self.evaluate(summary, file, expected))
            .collect())
    }

    /// Extraction and checks for one file.
    pub fn evaluate(
        &self,
        summary: &ParticipantSummary,
        file: &ConsentFile,
        expected: Option<NaiveDate>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new(summary.participant_id, file.consent_type());
        result.file_exists = true;
        result.file_path = Some(file.blob().path());
        result.file_upload_time = Some(file.blob().updated);
        result.expected_sign_date = expected;
        result.last_checked = Some((self.clock)());

        match file.signature() {
            Some(Signature::Text(text)) => {
                result.is_signature_valid = true;
                result.signature_str =
                    Some(text.chars().take(self.config.signature_max_length).collect());
            }
            Some(Signature::Image) => {
                result.is_signature_valid = true;
                result.is_signature_image = true;
            }
            None => {}
        }

        result.signing_date = file.signing_date();
        result.is_signing_date_valid = match (result.signing_date, expected) {
            (Some(signed), Some(expected)) => {
                (signed - expected).num_days().abs() < self.config.date_tolerance_days
            }
            _ => false,
        };

        if summary.upload_source.requires_printed_name() && file.variant().has_printed_name_field()
        {
            result.printed_name = file.printed_name();
            if !checks::is_valid_printed_name(result.printed_name.as_deref()) {
                result.other_errors.push(ConsentOtherError::InvalidPrintedName);
            }
        }

        for check in file.variant().checks {
            result
                .other_errors
                .extend(checks::run(*check, file, summary, &self.config));
        }

        result.sync_status = if result.is_signature_valid
            && result.is_signing_date_valid
            && result.other_errors.is_empty()
        {
            SyncStatus::ReadyForSync
        } else {
            SyncStatus::NeedsCorrecting
        };

        debug!(
            participant = %summary.participant_id,
            consent_type = %result.consent_type,
            path = %file.blob().path(),
            status = %result.sync_status,
            "consent file validated"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryBlobStore, MemoryParticipantFacts};
    use crate::consent::variant_for;
    use crate::domain::UploadSource;
    use crate::pdf::{PdfDocument, PdfElement, PdfPage, Rect};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, 10, 12, 0, 0).unwrap()
    }

    fn validator(facts: MemoryParticipantFacts) -> ConsentValidator {
        ConsentValidator::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(facts),
            ValidationConfig::default(),
        )
        .with_clock(fixed_now)
    }

    fn summary(source: UploadSource) -> ParticipantSummary {
        ParticipantSummary::new(ParticipantId(100), source)
    }

    fn primary_file(source: UploadSource, elements: Vec<PdfElement>) -> ConsentFile {
        let blob = crate::collaborators::BlobInfo {
            bucket: "bucket".to_string(),
            name: "Participant/P100/ConsentPII__1.pdf".to_string(),
            updated: fixed_now(),
        };
        let mut page = vec![PdfElement::new_text(
            "Sign Your Full Name:",
            Rect::new(40.0, 150.0, 120.0, 160.0),
        )];
        page.extend(elements);
        ConsentFile::new(
            variant_for(ConsentType::Primary, source).unwrap(),
            blob,
            PdfDocument::from_pages(vec![PdfPage::new(page)]),
        )
    }

    fn signed(date: &str, name: &str) -> Vec<PdfElement> {
        vec![
            PdfElement::new_text("Jane Doe", Rect::new(130.0, 155.0, 170.0, 165.0)),
            PdfElement::new_text(name, Rect::new(130.0, 130.0, 170.0, 140.0)),
            PdfElement::new_text(date, Rect::new(130.0, 105.0, 190.0, 115.0)),
        ]
    }

    #[test]
    fn test_date_tolerance_boundary() {
        let v = validator(MemoryParticipantFacts::new());
        let file = primary_file(UploadSource::Vibrent, signed("2022-03-01", "Jane Doe"));
        let s = summary(UploadSource::Vibrent);

        let nine = v.evaluate(&s, &file, NaiveDate::from_ymd_opt(2022, 3, 10));
        assert!(nine.is_signing_date_valid);
        assert_eq!(nine.sync_status, SyncStatus::ReadyForSync);

        let ten = v.evaluate(&s, &file, NaiveDate::from_ymd_opt(2022, 3, 11));
        assert!(!ten.is_signing_date_valid);
        assert_eq!(ten.sync_status, SyncStatus::NeedsCorrecting);

        let unknown = v.evaluate(&s, &file, None);
        assert!(!unknown.is_signing_date_valid);
    }

    #[test]
    fn test_printed_name_only_required_for_vibrent() {
        let v = validator(MemoryParticipantFacts::new());
        let expected = NaiveDate::from_ymd_opt(2022, 3, 1);

        let vibrent = primary_file(UploadSource::Vibrent, signed("2022-03-01", "null null"));
        let result = v.evaluate(&summary(UploadSource::Vibrent), &vibrent, expected);
        assert_eq!(result.other_errors, vec![ConsentOtherError::InvalidPrintedName]);

        let ce = primary_file(UploadSource::CareEvolution, Vec::new());
        let result = v.evaluate(&summary(UploadSource::CareEvolution), &ce, expected);
        assert!(!result.other_errors.contains(&ConsentOtherError::InvalidPrintedName));
    }

    #[test]
    fn test_veteran_pairing_mismatch() {
        let v = validator(MemoryParticipantFacts::new());
        let file = primary_file(UploadSource::Vibrent, signed("2022-03-01", "Jane Doe"));
        let mut veteran = summary(UploadSource::Vibrent);
        veteran.is_va_participant = true;
        let result = v.evaluate(&veteran, &file, NaiveDate::from_ymd_opt(2022, 3, 1));
        assert_eq!(
            result.other_errors,
            vec![ConsentOtherError::NonVeteranConsentForVeteran]
        );
        assert!(result.has_only_version_errors());
    }

    #[test]
    fn test_signature_is_truncated() {
        let mut v = validator(MemoryParticipantFacts::new());
        v.config.signature_max_length = 4;
        let file = primary_file(UploadSource::Vibrent, signed("2022-03-01", "Jane Doe"));
        let result = v.evaluate(&summary(UploadSource::Vibrent), &file, None);
        assert_eq!(result.signature_str.as_deref(), Some("Jane"));
    }

    #[test]
    fn test_missing_files_yield_one_missing_result() {
        let facts = MemoryParticipantFacts::new();
        facts.insert(summary(UploadSource::Vibrent));
        let v = validator(facts);
        let results = v.validate(ParticipantId(100), ConsentType::Gror, None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].file_exists);
        assert_eq!(results[0].sync_status, SyncStatus::NeedsCorrecting);
        assert_eq!(results[0].last_checked, Some(fixed_now()));
    }

    #[test]
    fn test_unknown_participant_is_invalid_input() {
        let v = validator(MemoryParticipantFacts::new());
        assert!(matches!(
            v.validate(ParticipantId(5), ConsentType::Primary, None),
            Err(ConsentError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_expected_date_uses_business_timezone() {
        let v = validator(MemoryParticipantFacts::new());
        let late_utc = Utc.with_ymd_and_hms(2022, 3, 3, 2, 0, 0).unwrap();
        assert_eq!(v.expected_date(late_utc), NaiveDate::from_ymd_opt(2022, 3, 2).unwrap());
    }
}
