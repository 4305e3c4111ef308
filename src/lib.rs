//! # DRE Builder
//!
//! A library for turning semi-structured spreadsheet exports from an
//! external accounting system into classified ledger entries and DRE
//! income-statement figures.
//!
//! ## Core Concepts
//!
//! - **Column resolution**: header wording and order vary between
//!   exports, so logical fields are located by normalized-substring
//!   match with a fixed positional fallback. Resolution never fails an
//!   upload.
//! - **Row normalization**: Brazilian-locale numbers (`1.234,56`),
//!   spreadsheet date serials and slash-delimited dates become one typed
//!   candidate record per row; malformed rows are skipped and counted.
//! - **Sign correction**: the source posts revenues as negative values.
//!   Every entry carries the original signed magnitudes plus canonical
//!   non-negative ones and a credit/debit tag.
//! - **Legend classification**: cost-class codes are looked up in a
//!   point-in-time legend snapshot; unknown codes are flagged, not
//!   guessed.
//! - **Duplicate detection**: a composite natural key is checked against
//!   the entries already committed for the same user. Duplicates are
//!   stored for audit and excluded from aggregation.
//! - **DRE aggregation**: classified entries fold into the seven
//!   income-statement figures under a currency selector.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dre_builder::*;
//!
//! let mut store = MemoryStore::new();
//!
//! let legend_bytes = std::fs::read("legend.xlsx")?;
//! UploadProcessor::replace_legend(&mut store, Some("user-1"), &legend_bytes)?;
//!
//! let report_bytes = std::fs::read("cji3-export.xlsx")?;
//! let summary = UploadProcessor::process_upload(
//!     &mut store,
//!     Some("user-1"),
//!     "cji3-export.xlsx",
//!     &report_bytes,
//!     &UploadOptions::default(),
//! )?;
//! println!("{} entries, {} unrecognized", summary.total, summary.unrecognized);
//!
//! let figures = dre_for_user(&store, "user-1", Currency::Local, None)?;
//! println!("operating result: {:.2}", figures.operating_result);
//! ```

pub mod columns;
pub mod dedup;
pub mod error;
pub mod ingestion;
pub mod legend;
pub mod rows;
pub mod schema;
pub mod sheet;
pub mod statement;
pub mod store;

pub use columns::{normalize_header, ColumnMap};
pub use dedup::{DuplicateIndex, NaturalKey};
pub use error::{DreBuilderError, Result};
pub use ingestion::UploadProcessor;
pub use legend::{classify, parse_legend_sheet, Classification, LegendSnapshot};
pub use rows::{apply_sign_correction, normalize_row, CandidateEntry, SignCorrected};
pub use schema::*;
pub use sheet::{read_first_sheet, SheetData};
pub use statement::{aggregate_dre, dre_for_user, DreFigures};
pub use store::{LedgerStore, MemoryStore};

use chrono::NaiveDate;

/// Ingests one ledger spreadsheet. See [`UploadProcessor::process_upload`].
pub fn process_spreadsheet_upload<S: LedgerStore>(
    store: &mut S,
    user_id: Option<&str>,
    file_name: &str,
    bytes: &[u8],
    options: &UploadOptions,
) -> Result<UploadSummary> {
    UploadProcessor::process_upload(store, user_id, file_name, bytes, options)
}

/// Replaces the cost-class legend. See [`UploadProcessor::replace_legend`].
pub fn load_cost_legend<S: LedgerStore>(
    store: &mut S,
    user_id: Option<&str>,
    bytes: &[u8],
) -> Result<LegendReport> {
    UploadProcessor::replace_legend(store, user_id, bytes)
}

/// Aggregates one user's non-duplicate entries into DRE figures.
pub fn build_dre<S: LedgerStore>(
    store: &S,
    user_id: &str,
    currency: Currency,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<DreFigures> {
    statement::dre_for_user(store, user_id, currency, range)
}
