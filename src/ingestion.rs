use crate::columns::ColumnMap;
use crate::dedup::{DuplicateIndex, NaturalKey};
use crate::error::{DreBuilderError, Result};
use crate::legend::{classify, parse_legend_sheet, Classification};
use crate::rows::{normalize_row, CandidateEntry};
use crate::schema::{LedgerEntry, LegendReport, UploadBatch, UploadOptions, UploadSummary};
use crate::sheet::{read_first_sheet, SheetData};
use crate::store::LedgerStore;
use log::{debug, info, warn};
use uuid::Uuid;

/// Runs uploads end-to-end: spreadsheet bytes in, persisted entries and
/// run counters out. One invocation handles one upload; there is no
/// background queue.
pub struct UploadProcessor;

impl UploadProcessor {
    /// Ingests one ledger spreadsheet for an authenticated user.
    ///
    /// The batch record is created in `Processing` before parsing starts
    /// and always reaches a terminal state: `Completed` with frozen
    /// counters, or `Failed` with the underlying message when the
    /// workbook cannot be read or the bulk insert is rejected. Malformed
    /// rows are skipped and counted, never fatal.
    pub fn process_upload<S: LedgerStore>(
        store: &mut S,
        user_id: Option<&str>,
        file_name: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<UploadSummary> {
        let user = authenticated_user(user_id)?;

        if bytes.len() > options.max_file_size {
            return Err(DreBuilderError::FileTooLarge {
                size: bytes.len(),
                max: options.max_file_size,
            });
        }

        let mut batch = UploadBatch::new(user, file_name, bytes.len());
        store.create_batch(batch.clone())?;
        info!(
            "processing upload {} ({}, {} bytes) for user {}",
            batch.id,
            file_name,
            bytes.len(),
            user
        );

        let sheet = match read_first_sheet(bytes) {
            Ok(sheet) => sheet,
            Err(err) => {
                fail_batch(store, &mut batch, &err);
                return Err(err);
            }
        };

        Self::ingest_sheet(store, &mut batch, &sheet, options)
    }

    fn ingest_sheet<S: LedgerStore>(
        store: &mut S,
        batch: &mut UploadBatch,
        sheet: &SheetData,
        options: &UploadOptions,
    ) -> Result<UploadSummary> {
        let columns = ColumnMap::resolve(&sheet.header);

        let legend = match store.legend_snapshot() {
            Ok(legend) => legend,
            Err(err) => {
                fail_batch(store, batch, &err);
                return Err(err);
            }
        };
        debug!("{} legend codes loaded at {}", legend.len(), legend.loaded_at());

        let index = match DuplicateIndex::load(store, &batch.user_id) {
            Ok(index) => index,
            Err(err) => {
                fail_batch(store, batch, &err);
                return Err(err);
            }
        };

        let mut entries: Vec<LedgerEntry> = Vec::with_capacity(sheet.rows.len());
        let mut skipped = 0usize;
        let mut unrecognized = 0usize;
        let mut duplicates = 0usize;

        for row in &sheet.rows {
            let Some(candidate) = normalize_row(row, &columns, options.ambiguous_date_order) else {
                skipped += 1;
                continue;
            };

            let classification = classify(
                &legend,
                &candidate.cost_class,
                candidate.value_doc,
                options.unrecognized_fallback,
            );
            if classification.is_unrecognized {
                unrecognized += 1;
            }

            let key = NaturalKey::of_candidate(&candidate, &batch.user_id);
            let is_duplicate = index.contains(&key);
            if is_duplicate {
                duplicates += 1;
            }

            entries.push(build_entry(batch.user_id.clone(), batch.id, candidate, classification, is_duplicate));
        }

        if skipped > 0 {
            warn!("upload {}: {} rows skipped", batch.id, skipped);
        }

        if !entries.is_empty() {
            if let Err(err) = store.insert_entries(&entries) {
                fail_batch(store, batch, &err);
                return Err(err);
            }
        }

        let total = entries.len();
        let classified = total - unrecognized;
        batch.complete(total, classified, unrecognized, duplicates);
        store.update_batch(batch)?;

        info!(
            "upload {} completed: {} entries ({} classified, {} unrecognized, {} duplicates)",
            batch.id, total, classified, unrecognized, duplicates
        );

        Ok(UploadSummary {
            upload_id: batch.id,
            total,
            classified,
            unrecognized,
            duplicates,
        })
    }

    /// Replaces the whole cost-class legend from a legend spreadsheet.
    ///
    /// The sheet is parsed and validated in full before the store is
    /// touched, so a structurally invalid sheet leaves the prior legend
    /// intact. Valid rows need a non-empty code and macro cost type.
    pub fn replace_legend<S: LedgerStore>(
        store: &mut S,
        user_id: Option<&str>,
        bytes: &[u8],
    ) -> Result<LegendReport> {
        let user = authenticated_user(user_id)?;
        info!("processing legend upload for user {}", user);

        let sheet = read_first_sheet(bytes)?;
        let entries = parse_legend_sheet(&sheet)?;
        let valid_rows = entries.len();

        let total_entries = store.replace_legend(entries)?;
        info!("legend replaced: {} valid rows, {} total entries", valid_rows, total_entries);

        Ok(LegendReport { total_entries })
    }
}

pub(crate) fn authenticated_user(user_id: Option<&str>) -> Result<&str> {
    user_id
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(DreBuilderError::Unauthorized)
}

fn fail_batch<S: LedgerStore>(store: &mut S, batch: &mut UploadBatch, err: &DreBuilderError) {
    batch.fail(err.to_string());
    if let Err(update_err) = store.update_batch(batch) {
        warn!("could not mark batch {} as failed: {}", batch.id, update_err);
    }
}

fn build_entry(
    user_id: String,
    upload_id: Uuid,
    candidate: CandidateEntry,
    classification: Classification,
    is_duplicate: bool,
) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        user_id,
        upload_id,
        posting_date: candidate.posting_date,
        object_name: candidate.object_code.clone(),
        object_code: candidate.object_code,
        cost_class: candidate.cost_class,
        cost_class_description: classification.cost_class_description,
        cost_type: classification.cost_type,
        macro_cost_type: classification.macro_cost_type,
        value_local: candidate.value_local,
        value_doc: candidate.value_doc,
        corrected_value_local: candidate.corrected_value_local,
        corrected_value_doc: candidate.corrected_value_doc,
        entry_type: candidate.entry_type,
        is_duplicate,
        is_unrecognized: classification.is_unrecognized,
        pep_element: None,
        document_text: None,
        document_number: None,
        purchase_document: None,
        reference_document: None,
        currency: candidate.currency_doc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_authenticated_user() {
        assert_eq!(authenticated_user(Some("user-1")).unwrap(), "user-1");
        assert_eq!(authenticated_user(Some("  user-1 ")).unwrap(), "user-1");
        assert!(matches!(authenticated_user(None), Err(DreBuilderError::Unauthorized)));
        assert!(matches!(authenticated_user(Some("  ")), Err(DreBuilderError::Unauthorized)));
    }

    #[test]
    fn test_upload_rejects_unauthenticated_caller_before_anything_else() {
        let mut store = MemoryStore::new();
        let result = UploadProcessor::process_upload(
            &mut store,
            None,
            "report.xlsx",
            b"irrelevant",
            &UploadOptions::default(),
        );

        assert!(matches!(result, Err(DreBuilderError::Unauthorized)));
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_upload_rejects_oversized_file_before_parsing() {
        let mut store = MemoryStore::new();
        let options = UploadOptions {
            max_file_size: 8,
            ..UploadOptions::default()
        };

        let result = UploadProcessor::process_upload(
            &mut store,
            Some("user-1"),
            "report.xlsx",
            b"way past the configured cap",
            &options,
        );

        match result {
            Err(DreBuilderError::FileTooLarge { size, max }) => {
                assert_eq!(size, 27);
                assert_eq!(max, 8);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_workbook_fails_the_batch() {
        use crate::schema::BatchStatus;

        let mut store = MemoryStore::new();
        let result = UploadProcessor::process_upload(
            &mut store,
            Some("user-1"),
            "report.xlsx",
            b"not a spreadsheet at all",
            &UploadOptions::default(),
        );
        assert!(result.is_err());
        assert_eq!(store.entry_count(), 0);

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].status, BatchStatus::Failed);
        assert!(batches[0].error_message.is_some());
    }

    #[test]
    fn test_legend_upload_requires_authentication() {
        let mut store = MemoryStore::new();
        let result = UploadProcessor::replace_legend(&mut store, None, b"irrelevant");
        assert!(matches!(result, Err(DreBuilderError::Unauthorized)));
    }
}
