//! Boundaries to the systems the engine depends on.
//!
//! The consent store is the sole persistence boundary, the blob store is a
//! pure byte source, the notifier emits fire-and-forget events and the
//! participant facts are read-only. Each is a trait so the engine can be
//! exercised with the in-process implementations in [`memory`] and
//! [`local`].

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::{
    MemoryBlobStore, MemoryConsentStore, MemoryParticipantFacts, RecordingNotifier,
    TracingNotifier,
};

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ConsentType, ParticipantId, UploadSource, ValidationResult};

/// Error enumeration for consent store and participant fact failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error enumeration for blob store failures.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob '{bucket}/{name}' not found")]
    NotFound { bucket: String, name: String },
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// A submission awaiting validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub consent_response_id: i64,
    pub consent_type: ConsentType,
    pub authored: DateTime<Utc>,
}

/// One page of pending work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingBatch {
    pub submissions: BTreeMap<ParticipantId, Vec<PendingSubmission>>,
    pub is_last: bool,
}

/// Reads and writes available inside a store transaction.
pub trait ConsentSession {
    fn results_for_participants(
        &mut self,
        ids: &[ParticipantId],
    ) -> Result<Vec<ValidationResult>, StoreError>;

    /// Inserts rows without an id and replaces rows with one. Returns the ids
    /// of every written row, in input order.
    fn batch_update(&mut self, results: Vec<ValidationResult>) -> Result<Vec<i64>, StoreError>;
}

/// Storage abstraction for validation results and pending submissions.
pub trait ConsentStore: Send + Sync {
    fn files_needing_correction(&self) -> Result<Vec<ValidationResult>, StoreError>;

    fn results_for_participants(
        &self,
        ids: &[ParticipantId],
    ) -> Result<Vec<ValidationResult>, StoreError>;

    fn result_by_id(&self, id: i64) -> Result<Option<ValidationResult>, StoreError>;

    fn batch_update(&self, results: Vec<ValidationResult>) -> Result<Vec<i64>, StoreError>;

    fn next_pending_batch(&self) -> Result<PendingBatch, StoreError>;

    /// Runs `work` atomically: everything it writes is committed together,
    /// or nothing is when it fails.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ConsentSession) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

/// Metadata describing an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub bucket: String,
    pub name: String,
    pub updated: DateTime<Utc>,
}

impl BlobInfo {
    /// `<bucket>/<name>`, the form stored in `file_path`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.bucket, self.name)
    }

    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Splits a stored `file_path` back into bucket and object name.
pub fn split_file_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('/')
        .filter(|(bucket, name)| !bucket.is_empty() && !name.is_empty())
}

/// Source of uploaded consent PDFs.
pub trait BlobStore: Send + Sync {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobInfo>, BlobError>;
    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, BlobError>;
    fn signed_url(&self, bucket: &str, name: &str) -> Result<String, BlobError>;
}

/// Outbound event hooks for partner distribution.
pub trait DownstreamNotifier: Send + Sync {
    fn notify_changed(&self, ids: &[i64]) -> Result<(), NotifyError>;
    fn schedule_fallback_check(&self, origin: &str, delay: Duration) -> Result<(), NotifyError>;
}

/// What the engine needs to know about a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_id: ParticipantId,
    pub upload_source: UploadSource,
    pub is_va_participant: bool,
    pub authored: BTreeMap<ConsentType, DateTime<Utc>>,
    pub state_of_residence: Option<String>,
    pub state_of_care: Option<String>,
}

impl ParticipantSummary {
    pub fn new(participant_id: ParticipantId, upload_source: UploadSource) -> Self {
        Self {
            participant_id,
            upload_source,
            is_va_participant: false,
            authored: BTreeMap::new(),
            state_of_residence: None,
            state_of_care: None,
        }
    }
}

/// Read-only participant facts.
pub trait ParticipantFacts: Send + Sync {
    fn summary(&self, id: ParticipantId) -> Result<Option<ParticipantSummary>, StoreError>;
    fn participant_ids(&self) -> Result<Vec<ParticipantId>, StoreError>;
}
