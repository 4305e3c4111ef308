use crate::error::{DreBuilderError, Result};
use crate::legend::LegendSnapshot;
use crate::schema::{LedgerEntry, LegendEntry, UploadBatch};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// The keyed record store the pipeline runs against. Persistence itself
/// is an external collaborator; this trait is the insert/select/update
/// surface the pipeline needs from it.
///
/// Contract points the pipeline relies on:
/// - `insert_entries` is a single bulk operation: it either commits every
///   entry or none of them. Backends should also carry a unique
///   constraint over the duplicate natural key as a backstop against
///   concurrent uploads racing the in-memory duplicate check.
/// - `replace_legend` swaps the whole legend in one operation; readers
///   see either the old table or the new one, never a partial load.
pub trait LedgerStore {
    fn create_batch(&mut self, batch: UploadBatch) -> Result<()>;

    /// Persists the batch's current state, keyed by id.
    fn update_batch(&mut self, batch: &UploadBatch) -> Result<()>;

    fn batch(&self, id: Uuid) -> Result<Option<UploadBatch>>;

    /// Bulk insert. All-or-nothing.
    fn insert_entries(&mut self, entries: &[LedgerEntry]) -> Result<()>;

    fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Replaces the whole legend table, returning the resulting row count.
    fn replace_legend(&mut self, entries: Vec<LegendEntry>) -> Result<usize>;

    /// Point-in-time view of the legend for classification.
    fn legend_snapshot(&self) -> Result<LegendSnapshot>;
}

/// In-memory reference implementation, used by tests and small
/// single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: HashMap<Uuid, UploadBatch>,
    entries: Vec<LedgerEntry>,
    legend: Vec<LegendEntry>,
    legend_replaced_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn batches(&self) -> Vec<&UploadBatch> {
        self.batches.values().collect()
    }

    pub fn legend_count(&self) -> usize {
        self.legend.len()
    }
}

impl LedgerStore for MemoryStore {
    fn create_batch(&mut self, batch: UploadBatch) -> Result<()> {
        self.batches.insert(batch.id, batch);
        Ok(())
    }

    fn update_batch(&mut self, batch: &UploadBatch) -> Result<()> {
        match self.batches.get_mut(&batch.id) {
            Some(stored) => {
                *stored = batch.clone();
                Ok(())
            }
            None => Err(DreBuilderError::Storage(format!(
                "unknown upload batch: {}",
                batch.id
            ))),
        }
    }

    fn batch(&self, id: Uuid) -> Result<Option<UploadBatch>> {
        Ok(self.batches.get(&id).cloned())
    }

    fn insert_entries(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    fn entries_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    fn replace_legend(&mut self, entries: Vec<LegendEntry>) -> Result<usize> {
        self.legend = entries;
        self.legend_replaced_at = Some(Utc::now());
        Ok(self.legend.len())
    }

    fn legend_snapshot(&self) -> Result<LegendSnapshot> {
        let loaded_at = self.legend_replaced_at.unwrap_or_else(Utc::now);
        Ok(LegendSnapshot::at(loaded_at, self.legend.clone()))
    }
}
