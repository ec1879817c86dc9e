use std::io::Write;
use std::sync::Arc;

use tracing::warn;

use super::ResultStrategy;
use crate::collaborators::{split_file_path, BlobStore};
use crate::domain::ValidationResult;
use crate::error::ConsentResult;

/// Writes a text report of files needing attention. Persists nothing.
pub struct LogResultStrategy {
    writer: Box<dyn Write + Send>,
    signer: Option<Arc<dyn BlobStore>>,
}

impl LogResultStrategy {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            signer: None,
        }
    }

    /// Prefixes each line with the record id and appends a signed URL from
    /// `blobs`.
    pub fn verbose(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.signer = Some(blobs);
        self
    }

    fn signed_url(&self, result: &ValidationResult) -> Option<String> {
        let blobs = self.signer.as_ref()?;
        let (bucket, name) = split_file_path(result.file_path.as_deref()?)?;
        match blobs.signed_url(bucket, name) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(bucket, name, error = %err, "could not sign report link");
                None
            }
        }
    }
}

/// `P<id> - <TYPE> <phrases>`, or with the record id and link when verbose.
pub fn report_line(result: &ValidationResult, verbose: bool, url: Option<&str>) -> String {
    let mut line = format!(
        "{} - {} {}",
        result.participant_id,
        result.consent_type.as_str(),
        result.error_phrases().join(", ")
    );
    if verbose {
        let id = result
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "new".to_string());
        line = format!("{id} - {line}");
        if let Some(url) = url {
            line.push(' ');
            line.push_str(url);
        }
    }
    line
}

impl ResultStrategy for LogResultStrategy {
    fn name(&self) -> &str {
        "log"
    }

    fn process(&mut self, batch: &[ValidationResult]) -> ConsentResult<Vec<i64>> {
        let verbose = self.signer.is_some();
        for result in batch {
            if result.error_phrases().is_empty() {
                continue;
            }
            let url = self.signed_url(result);
            let line = report_line(result, verbose, url.as_deref());
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryBlobStore;
    use crate::domain::{ConsentOtherError, ConsentType, ParticipantId, SyncStatus};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn gror_unchecked() -> ValidationResult {
        ValidationResult {
            id: Some(42),
            file_exists: true,
            file_path: Some("ptc/Participant/P100/GROR.pdf".to_string()),
            is_signature_valid: true,
            signing_date: NaiveDate::from_ymd_opt(2022, 3, 1),
            is_signing_date_valid: true,
            other_errors: vec![ConsentOtherError::MissingConsentCheckMark],
            ..ValidationResult::new(ParticipantId(100), ConsentType::Gror)
        }
    }

    #[test]
    fn test_report_line_formats() {
        let result = gror_unchecked();
        assert_eq!(
            report_line(&result, false, None),
            "P100 - GROR missing consent check mark"
        );
        assert_eq!(
            report_line(&result, true, Some("memory://x")),
            "42 - P100 - GROR missing consent check mark memory://x"
        );
    }

    #[test]
    fn test_only_flagged_results_are_reported() {
        let captured = Captured::default();
        let mut strategy = LogResultStrategy::new(Box::new(captured.clone()))
            .verbose(Arc::new(MemoryBlobStore::new()));
        let passing = ValidationResult {
            sync_status: SyncStatus::ReadyForSync,
            other_errors: Vec::new(),
            ..gror_unchecked()
        };
        let written = strategy.process(&[gror_unchecked(), passing]).unwrap();
        assert!(written.is_empty());
        assert_eq!(
            captured.text(),
            "42 - P100 - GROR missing consent check mark memory://ptc/Participant/P100/GROR.pdf\n"
        );
    }
}
