use std::collections::BTreeSet;

use crate::domain::{ConsentType, ParticipantId, ValidationResult};

/// Working copy of the stored rows for a flush.
///
/// Strategies read and modify it as if it were the table; only rows touched
/// along the way are written back.
#[derive(Debug, Clone, Default)]
pub(crate) struct Plan {
    rows: Vec<ValidationResult>,
    dirty: BTreeSet<usize>,
}

impl Plan {
    pub(crate) fn new(previous: Vec<ValidationResult>) -> Self {
        Self {
            rows: previous,
            dirty: BTreeSet::new(),
        }
    }

    pub(crate) fn row(&self, index: usize) -> &ValidationResult {
        &self.rows[index]
    }

    /// Indices of every row, stored or planned, in the group.
    pub(crate) fn group(&self, key: (ParticipantId, ConsentType)) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&index| self.rows[index].group_key() == key)
            .collect()
    }

    pub(crate) fn has_active(&self, key: (ParticipantId, ConsentType)) -> bool {
        self.group(key)
            .into_iter()
            .any(|index| self.rows[index].sync_status.is_active())
    }

    /// Active row in the group other than `except`.
    pub(crate) fn other_active(
        &self,
        key: (ParticipantId, ConsentType),
        except: usize,
    ) -> Option<usize> {
        self.group(key)
            .into_iter()
            .find(|&index| index != except && self.rows[index].sync_status.is_active())
    }

    /// Row describing the same file as `result`.
    pub(crate) fn find_same_file(&self, result: &ValidationResult) -> Option<usize> {
        (0..self.rows.len()).find(|&index| self.rows[index].same_file(result))
    }

    pub(crate) fn insert(&mut self, row: ValidationResult) -> usize {
        self.rows.push(row);
        let index = self.rows.len() - 1;
        self.dirty.insert(index);
        index
    }

    pub(crate) fn update(&mut self, index: usize, change: impl FnOnce(&mut ValidationResult)) {
        change(&mut self.rows[index]);
        self.dirty.insert(index);
    }

    /// Indices written so far, in row order.
    pub(crate) fn dirty(&self) -> Vec<usize> {
        self.dirty.iter().copied().collect()
    }

    pub(crate) fn into_writes(self) -> Vec<ValidationResult> {
        let Plan { rows, dirty } = self;
        rows.into_iter()
            .enumerate()
            .filter(|(index, _)| dirty.contains(index))
            .map(|(_, row)| row)
            .collect()
    }
}
