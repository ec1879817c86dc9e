//! In-process collaborator implementations.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use super::{
    BlobError, BlobInfo, BlobStore, ConsentSession, ConsentStore, DownstreamNotifier,
    NotifyError, ParticipantFacts, ParticipantSummary, PendingBatch, PendingSubmission,
    StoreError,
};
use crate::domain::{ParticipantId, SyncStatus, ValidationResult};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
}

#[derive(Debug, Clone, Default)]
struct Rows {
    by_id: BTreeMap<i64, ValidationResult>,
    next_id: i64,
}

impl Rows {
    fn for_participants(&self, ids: &[ParticipantId]) -> Vec<ValidationResult> {
        self.by_id
            .values()
            .filter(|row| ids.contains(&row.participant_id))
            .cloned()
            .collect()
    }

    fn write(&mut self, results: Vec<ValidationResult>) -> Result<Vec<i64>, StoreError> {
        let mut written = Vec::with_capacity(results.len());
        for mut result in results {
            let id = match result.id {
                Some(id) if self.by_id.contains_key(&id) => id,
                Some(id) => return Err(StoreError::NotFound(id)),
                None => {
                    self.next_id += 1;
                    self.next_id
                }
            };
            result.id = Some(id);
            self.by_id.insert(id, result);
            written.push(id);
        }
        Ok(written)
    }
}

impl ConsentSession for Rows {
    fn results_for_participants(
        &mut self,
        ids: &[ParticipantId],
    ) -> Result<Vec<ValidationResult>, StoreError> {
        Ok(self.for_participants(ids))
    }

    fn batch_update(&mut self, results: Vec<ValidationResult>) -> Result<Vec<i64>, StoreError> {
        self.write(results)
    }
}

/// Mutex-guarded consent store. Transactions work on a copy of the rows and
/// swap it in only when the work succeeds.
#[derive(Debug)]
pub struct MemoryConsentStore {
    rows: Mutex<Rows>,
    pending: Mutex<VecDeque<(ParticipantId, PendingSubmission)>>,
    pending_batch_size: usize,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::with_pending_batch_size(50)
    }

    /// `size` is the number of participants per pending batch.
    pub fn with_pending_batch_size(size: usize) -> Self {
        Self {
            rows: Mutex::new(Rows::default()),
            pending: Mutex::new(VecDeque::new()),
            pending_batch_size: size.max(1),
        }
    }

    pub fn queue_submission(
        &self,
        participant_id: ParticipantId,
        submission: PendingSubmission,
    ) -> Result<(), StoreError> {
        lock(&self.pending)?.push_back((participant_id, submission));
        Ok(())
    }

    /// Every stored row, ordered by id.
    pub fn all_results(&self) -> Result<Vec<ValidationResult>, StoreError> {
        Ok(lock(&self.rows)?.by_id.values().cloned().collect())
    }
}

impl Default for MemoryConsentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentStore for MemoryConsentStore {
    fn files_needing_correction(&self) -> Result<Vec<ValidationResult>, StoreError> {
        Ok(lock(&self.rows)?
            .by_id
            .values()
            .filter(|row| row.sync_status == SyncStatus::NeedsCorrecting)
            .cloned()
            .collect())
    }

    fn results_for_participants(
        &self,
        ids: &[ParticipantId],
    ) -> Result<Vec<ValidationResult>, StoreError> {
        Ok(lock(&self.rows)?.for_participants(ids))
    }

    fn result_by_id(&self, id: i64) -> Result<Option<ValidationResult>, StoreError> {
        Ok(lock(&self.rows)?.by_id.get(&id).cloned())
    }

    fn batch_update(&self, results: Vec<ValidationResult>) -> Result<Vec<i64>, StoreError> {
        let mut rows = lock(&self.rows)?;
        let mut staged = rows.clone();
        let ids = staged.write(results)?;
        *rows = staged;
        Ok(ids)
    }

    fn next_pending_batch(&self) -> Result<PendingBatch, StoreError> {
        let mut pending = lock(&self.pending)?;
        let mut submissions: BTreeMap<ParticipantId, Vec<PendingSubmission>> = BTreeMap::new();

        while let Some((participant_id, _)) = pending.front() {
            if !submissions.contains_key(participant_id)
                && submissions.len() >= self.pending_batch_size
            {
                break;
            }
            if let Some((participant_id, submission)) = pending.pop_front() {
                submissions.entry(participant_id).or_default().push(submission);
            }
        }

        Ok(PendingBatch {
            submissions,
            is_last: pending.is_empty(),
        })
    }

    fn transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn ConsentSession) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut rows = lock(&self.rows)?;
        let mut staged = rows.clone();
        work(&mut staged)?;
        *rows = staged;
        Ok(())
    }
}

/// Blob store backed by a map, keyed by bucket and object name.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<(String, String), (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>, updated: DateTime<Utc>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert((bucket.to_string(), name.to_string()), (bytes, updated));
        }
    }

    fn objects(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<(String, String), (Vec<u8>, DateTime<Utc>)>>, BlobError>
    {
        self.objects
            .lock()
            .map_err(|_| BlobError::Unavailable("blob lock poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobInfo>, BlobError> {
        Ok(self
            .objects()?
            .iter()
            .filter(|((b, name), _)| b == bucket && name.starts_with(prefix))
            .map(|((b, name), (_, updated))| BlobInfo {
                bucket: b.clone(),
                name: name.clone(),
                updated: *updated,
            })
            .collect())
    }

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, BlobError> {
        self.objects()?
            .get(&(bucket.to_string(), name.to_string()))
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| BlobError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    fn signed_url(&self, bucket: &str, name: &str) -> Result<String, BlobError> {
        Ok(format!("memory://{bucket}/{name}"))
    }
}

/// Participant facts held in a map.
#[derive(Debug, Default)]
pub struct MemoryParticipantFacts {
    summaries: Mutex<BTreeMap<ParticipantId, ParticipantSummary>>,
}

impl MemoryParticipantFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, summary: ParticipantSummary) {
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.insert(summary.participant_id, summary);
        }
    }
}

impl ParticipantFacts for MemoryParticipantFacts {
    fn summary(&self, id: ParticipantId) -> Result<Option<ParticipantSummary>, StoreError> {
        Ok(lock(&self.summaries)?.get(&id).cloned())
    }

    fn participant_ids(&self) -> Result<Vec<ParticipantId>, StoreError> {
        Ok(lock(&self.summaries)?.keys().copied().collect())
    }
}

/// Notifier that remembers every event, for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    changed: Mutex<Vec<i64>>,
    scheduled: Mutex<Vec<(String, Duration)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changed_ids(&self) -> Vec<i64> {
        self.changed.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    pub fn scheduled_checks(&self) -> Vec<(String, Duration)> {
        self.scheduled
            .lock()
            .map(|checks| checks.clone())
            .unwrap_or_default()
    }
}

impl DownstreamNotifier for RecordingNotifier {
    fn notify_changed(&self, ids: &[i64]) -> Result<(), NotifyError> {
        self.changed
            .lock()
            .map_err(|_| NotifyError::Transport("recorder lock poisoned".to_string()))?
            .extend_from_slice(ids);
        Ok(())
    }

    fn schedule_fallback_check(&self, origin: &str, delay: Duration) -> Result<(), NotifyError> {
        self.scheduled
            .lock()
            .map_err(|_| NotifyError::Transport("recorder lock poisoned".to_string()))?
            .push((origin.to_string(), delay));
        Ok(())
    }
}

/// Notifier that only logs, for command-line runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl DownstreamNotifier for TracingNotifier {
    fn notify_changed(&self, ids: &[i64]) -> Result<(), NotifyError> {
        info!(count = ids.len(), ?ids, "consent validation results changed");
        Ok(())
    }

    fn schedule_fallback_check(&self, origin: &str, delay: Duration) -> Result<(), NotifyError> {
        info!(origin, delay_secs = delay.as_secs(), "fallback error check scheduled");
        Ok(())
    }
}
