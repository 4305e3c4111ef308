use crate::error::Result;
use crate::schema::{Currency, LedgerEntry, MacroCostType};
use crate::store::LedgerStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The seven income-statement figures, in the selected currency.
///
/// Computed on demand from a ledger entry collection; never persisted.
/// Margin percentages are left to the presentation layer, which must
/// guard against a zero `net_revenue` before dividing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DreFigures {
    pub gross_revenue: f64,
    pub deductions: f64,
    pub net_revenue: f64,
    pub direct_costs: f64,
    pub gross_profit: f64,
    pub operating_expenses: f64,
    pub operating_result: f64,
}

/// Folds ledger entries into the DRE figures.
///
/// Duplicate-flagged entries are always excluded, by policy. The date
/// range is inclusive on both ends. Entries whose macro cost type is
/// absent or outside the four known buckets contribute to none of the
/// figures. The fold is a plain commutative sum per bucket, so the same
/// entry set always produces bit-identical results.
pub fn aggregate_dre(
    entries: &[LedgerEntry],
    currency: Currency,
    range: Option<(NaiveDate, NaiveDate)>,
) -> DreFigures {
    let mut gross_revenue = 0.0;
    let mut deductions = 0.0;
    let mut direct_costs = 0.0;
    let mut operating_expenses = 0.0;

    for entry in entries {
        if entry.is_duplicate {
            continue;
        }
        if let Some((start, end)) = range {
            if entry.posting_date < start || entry.posting_date > end {
                continue;
            }
        }

        let bucket = entry
            .macro_cost_type
            .as_deref()
            .and_then(MacroCostType::from_label);
        let Some(bucket) = bucket else {
            continue;
        };

        // Always the corrected magnitude, never the signed original.
        let value = match currency {
            Currency::Local => entry.corrected_value_local,
            Currency::Document => entry.corrected_value_doc,
        };

        match bucket {
            MacroCostType::Receita => gross_revenue += value,
            MacroCostType::Impostos => deductions += value,
            MacroCostType::CustoDireto => direct_costs += value,
            MacroCostType::DespesaOperacional => operating_expenses += value,
        }
    }

    let net_revenue = gross_revenue - deductions;
    let gross_profit = net_revenue - direct_costs;
    let operating_result = gross_profit - operating_expenses;

    DreFigures {
        gross_revenue,
        deductions,
        net_revenue,
        direct_costs,
        gross_profit,
        operating_expenses,
        operating_result,
    }
}

/// Store-backed convenience: aggregates one user's ledger.
pub fn dre_for_user<S: LedgerStore + ?Sized>(
    store: &S,
    user_id: &str,
    currency: Currency,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<DreFigures> {
    let entries = store.entries_for_user(user_id)?;
    Ok(aggregate_dre(&entries, currency, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntryType, LedgerEntry};
    use uuid::Uuid;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(macro_type: Option<&str>, value: f64, date: NaiveDate) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            upload_id: Uuid::new_v4(),
            posting_date: date,
            object_code: "OBJ".to_string(),
            object_name: "OBJ".to_string(),
            cost_class: "4001".to_string(),
            cost_class_description: "Sem legenda".to_string(),
            cost_type: "Services".to_string(),
            macro_cost_type: macro_type.map(|m| m.to_string()),
            value_local: -value,
            value_doc: -value,
            corrected_value_local: value,
            // Different document magnitude so currency selection is observable.
            corrected_value_doc: value / 2.0,
            entry_type: EntryType::Credit,
            is_duplicate: false,
            is_unrecognized: macro_type.is_none(),
            pep_element: None,
            document_text: None,
            document_number: None,
            purchase_document: None,
            reference_document: None,
            currency: None,
        }
    }

    fn sample_entries() -> Vec<LedgerEntry> {
        let date = ymd(2024, 3, 15);
        vec![
            entry(Some("receita"), 1000.0, date),
            entry(Some("impostos"), 100.0, date),
            entry(Some("custo direto"), 300.0, date),
            entry(Some("despesa operacional"), 200.0, date),
        ]
    }

    #[test]
    fn test_dre_derivation() {
        let figures = aggregate_dre(&sample_entries(), Currency::Local, None);

        assert_eq!(figures.gross_revenue, 1000.0);
        assert_eq!(figures.deductions, 100.0);
        assert_eq!(figures.net_revenue, 900.0);
        assert_eq!(figures.direct_costs, 300.0);
        assert_eq!(figures.gross_profit, 600.0);
        assert_eq!(figures.operating_expenses, 200.0);
        assert_eq!(figures.operating_result, 400.0);
    }

    #[test]
    fn test_currency_selector_picks_the_corrected_magnitude() {
        let figures = aggregate_dre(&sample_entries(), Currency::Document, None);
        assert_eq!(figures.gross_revenue, 500.0);
        assert_eq!(figures.operating_result, 200.0);
    }

    #[test]
    fn test_duplicates_never_reach_any_bucket() {
        let mut entries = sample_entries();
        let baseline = aggregate_dre(&entries, Currency::Local, None);

        let mut duplicate = entry(Some("receita"), 1_000_000.0, ymd(2024, 3, 15));
        duplicate.is_duplicate = true;
        entries.push(duplicate);

        assert_eq!(aggregate_dre(&entries, Currency::Local, None), baseline);
    }

    #[test]
    fn test_unbucketed_entries_are_silently_excluded() {
        let mut entries = sample_entries();
        let baseline = aggregate_dre(&entries, Currency::Local, None);

        entries.push(entry(None, 5000.0, ymd(2024, 3, 15)));
        entries.push(entry(Some("capex"), 5000.0, ymd(2024, 3, 15)));

        assert_eq!(aggregate_dre(&entries, Currency::Local, None), baseline);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let entries = vec![
            entry(Some("receita"), 100.0, ymd(2024, 1, 1)),
            entry(Some("receita"), 10.0, ymd(2024, 1, 31)),
            entry(Some("receita"), 1.0, ymd(2024, 2, 1)),
        ];

        let figures = aggregate_dre(
            &entries,
            Currency::Local,
            Some((ymd(2024, 1, 1), ymd(2024, 1, 31))),
        );
        assert_eq!(figures.gross_revenue, 110.0);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let mut entries = sample_entries();
        let forward = aggregate_dre(&entries, Currency::Local, None);
        entries.reverse();
        let backward = aggregate_dre(&entries, Currency::Local, None);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_input_yields_zeroes() {
        let figures = aggregate_dre(&[], Currency::Local, None);
        assert_eq!(figures.gross_revenue, 0.0);
        assert_eq!(figures.operating_result, 0.0);
    }
}
