use crate::error::{DreBuilderError, Result};
use crate::schema::{LegendEntry, MacroCostType, UnrecognizedFallback};
use crate::sheet::{cell_text, SheetData};
use calamine::Data;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Default cost-type label attached when the legend has no entry for a
/// code, or carries a blank cost type.
pub const UNCLASSIFIED_COST_TYPE: &str = "não classificado";

/// Default description attached when the legend has nothing to say.
pub const MISSING_LEGEND_DESCRIPTION: &str = "Sem legenda";

/// Required legend sheet columns, matched by exact header name.
pub const ACCOUNT_NUMBER_COLUMN: &str = "Account number";
pub const COST_TYPE_COLUMN: &str = "Cost type (ENG)";
pub const MACRO_COST_TYPE_COLUMN: &str = "Macro cost type";

const DESCRIPTION_COLUMN: &str = "Description";
const BS_PL_COLUMN: &str = "BS/P&L";
const GROUP_EXTERNAL_COLUMN: &str = "ENEL Group/Externel";
const EBITDA_COLUMN: &str = "EBITDA (Y/N)";
const BRAZILIAN_DESCRIPTION_COLUMN: &str = "Brazilian Description";
const COST_TYPE_CAPEX_COLUMN: &str = "Cost Type CAPEX";

/// Immutable point-in-time view of the code-to-category legend.
///
/// A batch classifies every row against one snapshot loaded before the
/// first row, so a legend replacement running concurrently can never
/// expose a half-loaded table, and entries are never re-classified when
/// the legend later changes.
#[derive(Debug, Clone)]
pub struct LegendSnapshot {
    loaded_at: DateTime<Utc>,
    by_code: HashMap<String, LegendEntry>,
}

impl LegendSnapshot {
    pub fn new(entries: Vec<LegendEntry>) -> Self {
        Self::at(Utc::now(), entries)
    }

    /// Builds a snapshot stamped with the moment the underlying table
    /// was last replaced. The first entry wins when a code repeats.
    pub fn at(loaded_at: DateTime<Utc>, entries: Vec<LegendEntry>) -> Self {
        let mut by_code = HashMap::with_capacity(entries.len());
        for entry in entries {
            by_code
                .entry(entry.account_number.trim().to_string())
                .or_insert(entry);
        }
        LegendSnapshot { loaded_at, by_code }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Exact-match lookup on the trimmed code.
    pub fn lookup(&self, code: &str) -> Option<&LegendEntry> {
        self.by_code.get(code.trim())
    }
}

/// Category metadata attached to an entry at classification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub cost_type: String,
    pub cost_class_description: String,
    pub macro_cost_type: Option<String>,
    pub is_unrecognized: bool,
}

/// Looks a cost-class code up in the legend snapshot. A miss never fails
/// the row: the entry is flagged unrecognized and persisted for later
/// triage. The sign-of-value guess for missing macro types is only
/// applied when the caller opted into it.
pub fn classify(
    legend: &LegendSnapshot,
    cost_class: &str,
    value_doc: f64,
    fallback: UnrecognizedFallback,
) -> Classification {
    match legend.lookup(cost_class) {
        Some(entry) => Classification {
            cost_type: if entry.cost_type.trim().is_empty() {
                UNCLASSIFIED_COST_TYPE.to_string()
            } else {
                entry.cost_type.clone()
            },
            cost_class_description: entry
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| MISSING_LEGEND_DESCRIPTION.to_string()),
            macro_cost_type: Some(entry.macro_cost_type.clone()),
            is_unrecognized: false,
        },
        None => {
            let macro_cost_type = match fallback {
                UnrecognizedFallback::None => None,
                UnrecognizedFallback::SignOfValue => {
                    let guessed = if value_doc < 0.0 {
                        MacroCostType::Receita
                    } else {
                        MacroCostType::DespesaOperacional
                    };
                    Some(guessed.label().to_string())
                }
            };

            Classification {
                cost_type: UNCLASSIFIED_COST_TYPE.to_string(),
                cost_class_description: MISSING_LEGEND_DESCRIPTION.to_string(),
                macro_cost_type,
                is_unrecognized: true,
            }
        }
    }
}

struct LegendColumns {
    account_number: usize,
    cost_type: usize,
    macro_cost_type: usize,
    description: Option<usize>,
    bs_pl: Option<usize>,
    group_external: Option<usize>,
    ebitda: Option<usize>,
    brazilian_description: Option<usize>,
    cost_type_capex: Option<usize>,
}

// Unlike ledger ingestion, the legend sheet is matched on exact header
// names and a missing required column aborts the whole operation before
// anything is deleted.
fn locate_columns(header: &[Data]) -> Result<LegendColumns> {
    let find = |name: &str| header.iter().position(|cell| cell_text(cell) == name);

    let account_number = find(ACCOUNT_NUMBER_COLUMN);
    let cost_type = find(COST_TYPE_COLUMN);
    let macro_cost_type = find(MACRO_COST_TYPE_COLUMN);

    let missing: Vec<&str> = [
        (ACCOUNT_NUMBER_COLUMN, account_number),
        (COST_TYPE_COLUMN, cost_type),
        (MACRO_COST_TYPE_COLUMN, macro_cost_type),
    ]
    .iter()
    .filter(|(_, idx)| idx.is_none())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(DreBuilderError::LegendMissingColumns(missing.join(", ")));
    }

    Ok(LegendColumns {
        account_number: account_number.unwrap(),
        cost_type: cost_type.unwrap(),
        macro_cost_type: macro_cost_type.unwrap(),
        description: find(DESCRIPTION_COLUMN),
        bs_pl: find(BS_PL_COLUMN),
        group_external: find(GROUP_EXTERNAL_COLUMN),
        ebitda: find(EBITDA_COLUMN),
        brazilian_description: find(BRAZILIAN_DESCRIPTION_COLUMN),
        cost_type_capex: find(COST_TYPE_CAPEX_COLUMN),
    })
}

fn trimmed(row: &[Data], idx: usize) -> Option<String> {
    let text = cell_text(row.get(idx)?);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Parses a legend sheet into entries, validating the structure up
/// front. Rows without a code or macro cost type are dropped; everything
/// else is carried through, so the caller can swap the full table in one
/// operation once parsing has succeeded.
pub fn parse_legend_sheet(sheet: &SheetData) -> Result<Vec<LegendEntry>> {
    let columns = locate_columns(&sheet.header)?;

    let mut entries = Vec::new();
    for row in &sheet.rows {
        let Some(account_number) = trimmed(row, columns.account_number) else {
            continue;
        };
        let Some(macro_cost_type) = trimmed(row, columns.macro_cost_type) else {
            continue;
        };

        entries.push(LegendEntry {
            account_number,
            cost_type: trimmed(row, columns.cost_type)
                .unwrap_or_else(|| UNCLASSIFIED_COST_TYPE.to_string()),
            macro_cost_type,
            description: columns.description.and_then(|idx| trimmed(row, idx)),
            bs_pl: columns.bs_pl.and_then(|idx| trimmed(row, idx)),
            group_external: columns.group_external.and_then(|idx| trimmed(row, idx)),
            ebitda: columns.ebitda.and_then(|idx| trimmed(row, idx)),
            brazilian_description: columns
                .brazilian_description
                .and_then(|idx| trimmed(row, idx)),
            cost_type_capex: columns.cost_type_capex.and_then(|idx| trimmed(row, idx)),
        });
    }

    Ok(entries)
}
