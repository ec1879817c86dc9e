//! Output strategies: what happens to validation results.
//!
//! Results are buffered by [`ValidationOutput`] and handed to a
//! [`ResultStrategy`] in batches. Persisting strategies reconcile each batch
//! against what is already stored, inside one store transaction, so that a
//! group never ends up with two active rows and confirmed rows are not
//! regressed by a transient read.

pub mod log;
mod plan;
mod reconsent;
pub mod replace;
pub mod store;
pub mod update;

pub use log::{report_line, LogResultStrategy};
pub use replace::ReplacementStrategy;
pub use store::StoreResultStrategy;
pub use update::UpdateResultStrategy;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::collaborators::{ConsentStore, DownstreamNotifier};
use crate::domain::{ParticipantId, ValidationResult};
use crate::error::ConsentResult;
use plan::Plan;

/// Strategy for handling a batch of validation results.
///
/// Implementations decide whether and how results are persisted
/// (append, replace, update in place) or only reported.
pub trait ResultStrategy: Send {
    /// Handles one batch.
    ///
    /// # Arguments
    /// * `batch` - Results produced since the previous flush
    ///
    /// # Returns
    /// Ids of every stored row that was inserted or changed
    fn process(&mut self, batch: &[ValidationResult]) -> ConsentResult<Vec<i64>>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;
}

/// Reconciles `batch` with the stored rows of its participants and writes
/// the outcome, all in one transaction.
pub(crate) fn persist(
    store: &dyn ConsentStore,
    batch: &[ValidationResult],
    planner: fn(&mut Plan, &[ValidationResult]),
) -> ConsentResult<Vec<i64>> {
    let participants: Vec<ParticipantId> = batch
        .iter()
        .map(|result| result.participant_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut written = Vec::new();
    store.transaction(&mut |session| {
        let previous = session.results_for_participants(&participants)?;
        let mut plan = Plan::new(previous);
        planner(&mut plan, batch);
        reconsent::resolve(&mut plan);
        written = session.batch_update(plan.into_writes())?;
        Ok(())
    })?;
    Ok(written)
}

/// Buffers results and flushes them through a strategy.
///
/// Flushes when the buffer reaches the batch size, on [`finish`], and as a
/// last resort when dropped. Errors from a flush during drop can only be
/// logged; call [`finish`] to observe them.
///
/// [`finish`]: ValidationOutput::finish
pub struct ValidationOutput {
    strategy: Box<dyn ResultStrategy>,
    notifier: Option<Arc<dyn DownstreamNotifier>>,
    pending: Vec<ValidationResult>,
    batch_size: usize,
    changed: Vec<i64>,
}

impl ValidationOutput {
    pub fn new(strategy: Box<dyn ResultStrategy>, batch_size: usize) -> Self {
        Self {
            strategy,
            notifier: None,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            changed: Vec::new(),
        }
    }

    /// Reports changed ids to `notifier` after every flush.
    pub fn with_notifier(mut self, notifier: Arc<dyn DownstreamNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(store: Arc<dyn ConsentStore>, batch_size: usize) -> Self {
        Self::new(Box::new(StoreResultStrategy::new(store)), batch_size)
    }

    pub fn replace(store: Arc<dyn ConsentStore>, batch_size: usize) -> Self {
        Self::new(Box::new(ReplacementStrategy::new(store)), batch_size)
    }

    pub fn update(store: Arc<dyn ConsentStore>, batch_size: usize) -> Self {
        Self::new(Box::new(UpdateResultStrategy::new(store)), batch_size)
    }

    pub fn add(&mut self, result: ValidationResult) -> ConsentResult<()> {
        self.pending.push(result);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn add_all(&mut self, results: impl IntoIterator<Item = ValidationResult>) -> ConsentResult<()> {
        for result in results {
            self.add(result)?;
        }
        Ok(())
    }

    /// Hands buffered results to the strategy and notifies downstream.
    pub fn flush(&mut self) -> ConsentResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let ids = self.strategy.process(&batch)?;
        info!(
            strategy = self.strategy.name(),
            results = batch.len(),
            changed = ids.len(),
            "validation results flushed"
        );

        if !ids.is_empty() {
            if let Some(notifier) = &self.notifier {
                if let Err(err) = notifier.notify_changed(&ids) {
                    warn!(error = %err, count = ids.len(), "downstream notification failed");
                }
            }
        }
        self.changed.extend(ids);
        Ok(())
    }

    /// Flushes what is left and returns the ids changed over the output's
    /// lifetime.
    pub fn finish(mut self) -> ConsentResult<Vec<i64>> {
        self.flush()?;
        Ok(std::mem::take(&mut self.changed))
    }
}

impl Drop for ValidationOutput {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(err) = self.flush() {
            error!(
                strategy = self.strategy.name(),
                error = %err,
                "failed to flush validation results on drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryConsentStore, RecordingNotifier};
    use crate::domain::{ConsentType, SyncStatus};

    fn missing(participant: i64) -> ValidationResult {
        ValidationResult::new(ParticipantId(participant), ConsentType::Primary)
    }

    #[test]
    fn test_flushes_at_batch_size() {
        let store = Arc::new(MemoryConsentStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let mut output =
            ValidationOutput::store(store.clone(), 2).with_notifier(notifier.clone());

        output.add(missing(1)).unwrap();
        assert!(store.all_results().unwrap().is_empty());
        output.add(missing(2)).unwrap();
        assert_eq!(store.all_results().unwrap().len(), 2);
        assert_eq!(notifier.changed_ids(), vec![1, 2]);

        output.add(missing(3)).unwrap();
        assert_eq!(output.finish().unwrap(), vec![1, 2, 3]);
        assert_eq!(notifier.changed_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_flushes_pending_results() {
        let store = Arc::new(MemoryConsentStore::new());
        {
            let mut output = ValidationOutput::replace(store.clone(), 100);
            output.add(missing(1)).unwrap();
        }
        let rows = store.all_results().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sync_status, SyncStatus::NeedsCorrecting);
    }
}
