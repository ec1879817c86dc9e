//! Entry points that drive validation runs end to end.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::collaborators::{BlobStore, ConsentStore, DownstreamNotifier, ParticipantFacts};
use crate::config::ValidationConfig;
use crate::domain::{ConsentType, ParticipantId, SyncStatus, ValidationResult};
use crate::error::{ConsentError, ConsentResult};
use crate::output::ValidationOutput;
use crate::validation::ConsentValidator;

/// Origin tag of the fallback error check scheduled by the polling run.
pub const FALLBACK_CHECK_ORIGIN: &str = "consent_validation";

/// Selection for bulk validation. Empty fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationFilter {
    pub participant_ids: Option<Vec<ParticipantId>>,
    pub consent_types: Option<Vec<ConsentType>>,
    pub authored_after: Option<DateTime<Utc>>,
    pub authored_before: Option<DateTime<Utc>>,
}

impl ValidationFilter {
    pub fn includes(&self, consent_type: ConsentType, authored: DateTime<Utc>) -> bool {
        self.consent_types
            .as_ref()
            .map_or(true, |types| types.contains(&consent_type))
            && self.authored_after.map_or(true, |after| authored >= after)
            && self.authored_before.map_or(true, |before| authored < before)
    }
}

/// Rows needing correction for one (participant, type).
#[derive(Debug, Default)]
struct CorrectionGroup {
    expected: Option<NaiveDate>,
    has_missing_row: bool,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Results handed to the output strategy.
    pub validated: usize,
    /// Stored rows inserted or changed.
    pub changed_ids: Vec<i64>,
}

/// Keeps only the first passing result when a type has one.
pub fn prefer_passing(results: Vec<ValidationResult>) -> Vec<ValidationResult> {
    match results
        .iter()
        .position(|result| result.sync_status == SyncStatus::ReadyForSync)
    {
        Some(index) => results.into_iter().nth(index).into_iter().collect(),
        None => results,
    }
}

pub struct ConsentValidationController {
    store: Arc<dyn ConsentStore>,
    facts: Arc<dyn ParticipantFacts>,
    notifier: Arc<dyn DownstreamNotifier>,
    validator: ConsentValidator,
}

impl ConsentValidationController {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        blobs: Arc<dyn BlobStore>,
        facts: Arc<dyn ParticipantFacts>,
        notifier: Arc<dyn DownstreamNotifier>,
        config: ValidationConfig,
    ) -> Self {
        let validator = ConsentValidator::new(blobs, facts.clone(), config);
        Self::with_validator(store, facts, notifier, validator)
    }

    pub fn with_validator(
        store: Arc<dyn ConsentStore>,
        facts: Arc<dyn ParticipantFacts>,
        notifier: Arc<dyn DownstreamNotifier>,
        validator: ConsentValidator,
    ) -> Self {
        Self {
            store,
            facts,
            notifier,
            validator,
        }
    }

    pub fn validator(&self) -> &ConsentValidator {
        &self.validator
    }

    fn output(&self, make: fn(Arc<dyn ConsentStore>, usize) -> ValidationOutput) -> ValidationOutput {
        make(self.store.clone(), self.validator.config().batch_size)
            .with_notifier(self.notifier.clone())
    }

    /// Validates every pending submission.
    ///
    /// A fallback error check is scheduled first, so a run that dies
    /// part-way is still followed up.
    pub fn validate_consent_submissions(&self) -> ConsentResult<RunSummary> {
        if let Err(err) = self.notifier.schedule_fallback_check(
            FALLBACK_CHECK_ORIGIN,
            self.validator.config().fallback_delay,
        ) {
            warn!(error = %err, "could not schedule fallback error check");
        }

        let mut output = self.output(ValidationOutput::replace);
        let mut validated = 0;
        loop {
            let batch = self.store.next_pending_batch()?;
            for (participant_id, submissions) in &batch.submissions {
                for submission in submissions {
                    let Some(mut results) = self.skip_unknown(self.validator.validate(
                        *participant_id,
                        submission.consent_type,
                        Some(submission.authored),
                    ))?
                    else {
                        continue;
                    };
                    for result in &mut results {
                        result.consent_response_id = Some(submission.consent_response_id);
                    }
                    let results = prefer_passing(results);
                    validated += results.len();
                    output.add_all(results)?;
                }
            }
            if batch.is_last {
                break;
            }
        }

        self.finish("pending submissions", output, validated)
    }

    /// Bulk validation driven by participant facts.
    pub fn validate_participants(&self, filter: &ValidationFilter) -> ConsentResult<RunSummary> {
        let participant_ids = match &filter.participant_ids {
            Some(ids) => ids.clone(),
            None => self.facts.participant_ids()?,
        };

        let mut output = self.output(ValidationOutput::store);
        let mut validated = 0;
        for participant_id in participant_ids {
            let Some(summary) = self.facts.summary(participant_id)? else {
                warn!(participant = %participant_id, "no participant facts, skipping");
                continue;
            };
            for (consent_type, authored) in &summary.authored {
                if !filter.includes(*consent_type, *authored) {
                    continue;
                }
                let results = self.validator.validate(
                    participant_id,
                    *consent_type,
                    Some(*authored),
                )?;
                let results = prefer_passing(results);
                validated += results.len();
                output.add_all(results)?;
            }
        }

        self.finish("bulk validation", output, validated)
    }

    /// Every type the participant has authored.
    pub fn validate_all_for_participant(
        &self,
        participant_id: ParticipantId,
    ) -> ConsentResult<RunSummary> {
        let summary = self
            .facts
            .summary(participant_id)?
            .ok_or_else(|| ConsentError::InvalidInput {
                parameter: "participant_id".to_string(),
                reason: format!("no participant facts for {participant_id}"),
            })?;

        let mut output = self.output(ValidationOutput::replace);
        let mut validated = 0;
        for (consent_type, authored) in &summary.authored {
            let results =
                self.validator
                    .validate(participant_id, *consent_type, Some(*authored))?;
            let results = prefer_passing(results);
            validated += results.len();
            output.add_all(results)?;
        }

        self.finish("participant validation", output, validated)
    }

    /// Re-checks every row that needs correcting against the expected date on
    /// record for it, then looks for new files in each affected group. Files
    /// already held by a stored row are only ever re-read through their own
    /// row, so settled rows in the same group are left alone.
    pub fn check_for_corrections(&self) -> ConsentResult<RunSummary> {
        let mut groups: BTreeMap<(ParticipantId, ConsentType), CorrectionGroup> =
            BTreeMap::new();
        let mut output = self.output(ValidationOutput::update);
        let mut validated = 0;

        for row in self.store.files_needing_correction()? {
            let group = groups.entry(row.group_key()).or_default();
            if group.expected.is_none() {
                group.expected = row.expected_sign_date;
            }
            if row.file_path.is_none() {
                group.has_missing_row = true;
                continue;
            }
            let Some(results) = self.skip_unknown(self.validator.revalidate(&row))? else {
                continue;
            };
            validated += results.len();
            output.add_all(results)?;
        }
        if groups.is_empty() {
            return self.finish("correction check", output, validated);
        }

        let participant_ids: Vec<ParticipantId> =
            groups.keys().map(|(participant_id, _)| *participant_id).collect();
        let known_paths: BTreeSet<String> = self
            .store
            .results_for_participants(&participant_ids)?
            .into_iter()
            .filter_map(|row| row.file_path)
            .collect();

        for ((participant_id, consent_type), group) in groups {
            let Some(results) = self.skip_unknown(self.validator.validate_expecting(
                participant_id,
                consent_type,
                group.expected,
            ))?
            else {
                continue;
            };
            let results: Vec<ValidationResult> = results
                .into_iter()
                .filter(|result| match &result.file_path {
                    Some(path) => !known_paths.contains(path),
                    None => group.has_missing_row,
                })
                .collect();
            validated += results.len();
            output.add_all(results)?;
        }

        self.finish("correction check", output, validated)
    }

    /// Re-checks one stored record.
    pub fn revalidate_record(&self, id: i64) -> ConsentResult<RunSummary> {
        let existing = self
            .store
            .result_by_id(id)?
            .ok_or(crate::collaborators::StoreError::NotFound(id))?;
        let results = self.validator.revalidate(&existing)?;

        let mut output = self.output(ValidationOutput::update);
        let validated = results.len();
        output.add_all(results)?;
        self.finish("record revalidation", output, validated)
    }

    /// Participants without facts are logged and skipped in batch runs.
    fn skip_unknown(
        &self,
        outcome: ConsentResult<Vec<ValidationResult>>,
    ) -> ConsentResult<Option<Vec<ValidationResult>>> {
        match outcome {
            Ok(results) => Ok(Some(results)),
            Err(ConsentError::InvalidInput { parameter, reason })
                if parameter == "participant_id" =>
            {
                warn!(%reason, "skipping participant");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn finish(
        &self,
        run: &str,
        output: ValidationOutput,
        validated: usize,
    ) -> ConsentResult<RunSummary> {
        let changed_ids = output.finish()?;
        info!(run, validated, changed = changed_ids.len(), "consent validation run complete");
        Ok(RunSummary {
            validated,
            changed_ids,
        })
    }
}
