use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Posting polarity after the source-system sign rule has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    /// Source-system convention: negative document-currency values are
    /// revenue postings (credits), positive values are expenses (debits).
    pub fn from_document_value(value_doc: f64) -> Self {
        if value_doc < 0.0 {
            EntryType::Credit
        } else {
            EntryType::Debit
        }
    }
}

/// The coarse category that drives income-statement bucket assignment.
/// Legend labels outside this set fall into no bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum MacroCostType {
    Receita,
    Impostos,
    CustoDireto,
    DespesaOperacional,
}

impl MacroCostType {
    /// Case-insensitive match against the labels stored in the legend.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "receita" => Some(MacroCostType::Receita),
            "impostos" => Some(MacroCostType::Impostos),
            "custo direto" => Some(MacroCostType::CustoDireto),
            "despesa operacional" => Some(MacroCostType::DespesaOperacional),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MacroCostType::Receita => "receita",
            MacroCostType::Impostos => "impostos",
            MacroCostType::CustoDireto => "custo direto",
            MacroCostType::DespesaOperacional => "despesa operacional",
        }
    }
}

/// Which of the two independently-sourced magnitudes a query reads.
/// The source exports carry BRL as the local currency and EUR as the
/// document currency; values are never converted between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Local,
    Document,
}

/// One persisted ledger posting. This is the compatibility-bearing shape
/// for any storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LedgerEntry {
    pub id: Uuid,

    #[schemars(description = "Stable identifier of the uploading user; every entry belongs to exactly one user")]
    pub user_id: String,

    #[schemars(description = "The upload batch this entry arrived in")]
    pub upload_id: Uuid,

    #[schemars(description = "Calendar posting date, no time component")]
    pub posting_date: NaiveDate,

    pub object_code: String,
    pub object_name: String,

    #[schemars(description = "The source system's account code used as the classification key")]
    pub cost_class: String,

    pub cost_class_description: String,
    pub cost_type: String,

    #[schemars(
        description = "Coarse category label attached at classification time; absent when the code was not in the legend and no fallback was requested"
    )]
    pub macro_cost_type: Option<String>,

    #[schemars(description = "Original signed magnitude in the local currency, as sourced")]
    pub value_local: f64,

    #[schemars(description = "Original signed magnitude in the document currency, as sourced")]
    pub value_doc: f64,

    #[schemars(description = "Canonical non-negative local-currency magnitude (abs of value_local)")]
    pub corrected_value_local: f64,

    #[schemars(description = "Canonical non-negative document-currency magnitude (abs of value_doc)")]
    pub corrected_value_doc: f64,

    pub entry_type: EntryType,

    #[schemars(
        description = "Set once at ingestion when an identical posting already existed; duplicates are stored for audit but excluded from aggregation"
    )]
    pub is_duplicate: bool,

    #[schemars(description = "True when the cost class was not found in the legend snapshot")]
    pub is_unrecognized: bool,

    pub pep_element: Option<String>,
    pub document_text: Option<String>,
    pub document_number: Option<String>,
    pub purchase_document: Option<String>,
    pub reference_document: Option<String>,

    #[schemars(description = "Document-currency code as named by the export, when the column is present")]
    pub currency: Option<String>,
}

/// One row of the code-to-category legend. Keyed by `account_number`;
/// the whole table is replaced on each legend upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LegendEntry {
    pub account_number: String,
    pub cost_type: String,
    pub macro_cost_type: String,
    pub description: Option<String>,
    pub bs_pl: Option<String>,
    pub group_external: Option<String>,
    pub ebitda: Option<String>,
    pub brazilian_description: Option<String>,
    pub cost_type_capex: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Processing,
    Completed,
    Failed,
}

/// One upload's unit of work. Created in `Processing` before parsing
/// begins and finalized exactly once to `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadBatch {
    pub id: Uuid,
    pub user_id: String,
    pub file_name: String,
    pub file_size: usize,
    pub status: BatchStatus,
    pub error_message: Option<String>,
    pub total_entries: usize,
    pub classified_entries: usize,
    pub unrecognized_entries: usize,
    pub duplicate_entries: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadBatch {
    pub fn new(user_id: &str, file_name: &str, file_size: usize) -> Self {
        UploadBatch {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            file_name: file_name.to_string(),
            file_size,
            status: BatchStatus::Processing,
            error_message: None,
            total_entries: 0,
            classified_entries: 0,
            unrecognized_entries: 0,
            duplicate_entries: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Freeze the run counters and move to the `Completed` terminal state.
    pub fn complete(&mut self, total: usize, classified: usize, unrecognized: usize, duplicates: usize) {
        self.status = BatchStatus::Completed;
        self.total_entries = total;
        self.classified_entries = classified;
        self.unrecognized_entries = unrecognized;
        self.duplicate_entries = duplicates;
        self.completed_at = Some(Utc::now());
    }

    /// Move to the `Failed` terminal state, recording the underlying message.
    pub fn fail(&mut self, message: String) {
        self.status = BatchStatus::Failed;
        self.error_message = Some(message);
        self.completed_at = Some(Utc::now());
    }
}

/// Run-level counters returned to the caller after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub upload_id: Uuid,
    pub total: usize,
    pub classified: usize,
    pub unrecognized: usize,
    pub duplicates: usize,
}

/// Result of a legend replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendReport {
    pub total_entries: usize,
}

/// How to read a slash-delimited date when both leading components
/// are <= 12 and the ordering cannot be inferred from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateOrder {
    /// "03/04/2024" is March 4th. Matches the source exports seen so far.
    #[default]
    MonthDay,
    /// "03/04/2024" is April 3rd.
    DayMonth,
}

/// What to attach as the macro cost type when a code misses the legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnrecognizedFallback {
    /// Leave the macro cost type absent. The entry is flagged and triaged
    /// by operators via a later legend update.
    #[default]
    None,
    /// Guess from the sign of the document-currency value: negative means
    /// revenue, positive means operating expense. Explicit opt-in only.
    SignOfValue,
}

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Caller-supplied knobs for one upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub ambiguous_date_order: DateOrder,
    pub unrecognized_fallback: UnrecognizedFallback,
    pub max_file_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            ambiguous_date_order: DateOrder::MonthDay,
            unrecognized_fallback: UnrecognizedFallback::None,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}
