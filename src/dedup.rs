use crate::error::Result;
use crate::rows::CandidateEntry;
use crate::schema::LedgerEntry;
use crate::store::LedgerStore;
use chrono::NaiveDate;
use log::debug;
use std::collections::HashSet;

/// Composite natural key a posting is considered a duplicate under:
/// posting date, object code, cost-class code, the original signed
/// local-currency value, and the owning user.
///
/// The monetary component is held as its canonical bit pattern so the
/// key is hashable; parsing never produces NaN and negative zero is
/// folded into zero before the bits are taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    posting_date: NaiveDate,
    object_code: String,
    cost_class: String,
    value_local_bits: u64,
    user_id: String,
}

impl NaturalKey {
    pub fn new(
        posting_date: NaiveDate,
        object_code: &str,
        cost_class: &str,
        value_local: f64,
        user_id: &str,
    ) -> Self {
        NaturalKey {
            posting_date,
            object_code: object_code.to_string(),
            cost_class: cost_class.to_string(),
            value_local_bits: canonical_bits(value_local),
            user_id: user_id.to_string(),
        }
    }

    pub fn of_entry(entry: &LedgerEntry) -> Self {
        Self::new(
            entry.posting_date,
            &entry.object_code,
            &entry.cost_class,
            entry.value_local,
            &entry.user_id,
        )
    }

    pub fn of_candidate(candidate: &CandidateEntry, user_id: &str) -> Self {
        Self::new(
            candidate.posting_date,
            &candidate.object_code,
            &candidate.cost_class,
            candidate.value_local,
            user_id,
        )
    }
}

fn canonical_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Natural keys of every entry already committed for one user, loaded in
/// a single store read before the batch starts.
///
/// Membership checks then run locally per row instead of one store
/// round-trip each. The index is deliberately not updated while a batch
/// runs: rows inside one batch are only checked against entries
/// committed by prior batches, never against each other.
#[derive(Debug)]
pub struct DuplicateIndex {
    keys: HashSet<NaturalKey>,
}

impl DuplicateIndex {
    pub fn load<S: LedgerStore + ?Sized>(store: &S, user_id: &str) -> Result<Self> {
        let existing = store.entries_for_user(user_id)?;
        let keys: HashSet<NaturalKey> = existing.iter().map(NaturalKey::of_entry).collect();
        debug!("duplicate index loaded: {} keys for user {}", keys.len(), user_id);
        Ok(DuplicateIndex { keys })
    }

    pub fn contains(&self, key: &NaturalKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
