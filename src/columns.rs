use crate::sheet::cell_text;
use calamine::Data;
use log::{debug, info};

/// Column positions for the logical fields the pipeline consumes,
/// resolved once per upload from the header row. Immutable afterwards.
///
/// Header wording and column order vary between exports, so each field
/// is located by normalized-substring match against a set of candidate
/// phrases, scanning left to right. A field with no matching header
/// falls back to the fixed position of the known source layout, so
/// resolution is total and never fails an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub posting_date: usize,
    pub object_code: usize,
    pub cost_class: usize,
    pub value_doc: usize,
    pub value_local: usize,
    pub currency_doc: Option<usize>,
}

const POSTING_DATE_CANDIDATES: [&str; 1] = ["data de lancamento"];
const OBJECT_CODE_CANDIDATES: [&str; 2] = ["denominacao de objeto", "objeto"];
const COST_CLASS_CANDIDATES: [&str; 1] = ["classe de custo"];
const VALUE_DOC_CANDIDATES: [&str; 4] = [
    "valor moed transacao",
    "valor moeda transacao",
    "valor em euro",
    "valor eur",
];
const VALUE_LOCAL_CANDIDATES: [&str; 4] = [
    "valor moeda acc",
    "valor em reais",
    "valor brl",
    "valor em real",
];
const CURRENCY_DOC_CANDIDATES: [&str; 1] = ["moeda da transacao"];

// Fixed positions of the known source layout (columns B, D, F, J, U).
const DEFAULT_POSTING_DATE: usize = 1;
const DEFAULT_OBJECT_CODE: usize = 3;
const DEFAULT_COST_CLASS: usize = 5;
const DEFAULT_VALUE_DOC: usize = 9;
const DEFAULT_VALUE_LOCAL: usize = 20;

impl ColumnMap {
    pub fn resolve(header: &[Data]) -> ColumnMap {
        let normalized: Vec<String> = header
            .iter()
            .map(|cell| normalize_header(&cell_text(cell)))
            .collect();

        let find = |candidates: &[&str]| {
            normalized
                .iter()
                .position(|h| candidates.iter().any(|c| h.contains(c)))
        };

        let map = ColumnMap {
            posting_date: find(&POSTING_DATE_CANDIDATES).unwrap_or(DEFAULT_POSTING_DATE),
            object_code: find(&OBJECT_CODE_CANDIDATES).unwrap_or(DEFAULT_OBJECT_CODE),
            cost_class: find(&COST_CLASS_CANDIDATES).unwrap_or(DEFAULT_COST_CLASS),
            value_doc: find(&VALUE_DOC_CANDIDATES).unwrap_or(DEFAULT_VALUE_DOC),
            value_local: find(&VALUE_LOCAL_CANDIDATES).unwrap_or(DEFAULT_VALUE_LOCAL),
            currency_doc: find(&CURRENCY_DOC_CANDIDATES),
        };

        debug!("header row: {:?}", normalized);
        info!(
            "resolved columns -> date: {} object: {} cost class: {} value doc: {} value local: {} currency: {:?}",
            map.posting_date, map.object_code, map.cost_class, map.value_doc, map.value_local, map.currency_doc
        );

        map
    }
}

/// Case-folds, strips diacritics, collapses every non-alphanumeric run
/// into a single space and trims. "Classe de Custo " and
/// "CLASSE-DE-CUSTO" both normalize to "classe de custo".
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.to_lowercase().chars() {
        let c = fold_diacritic(c);
        if c.is_ascii_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<Data> {
        cells.iter().map(|c| Data::String(c.to_string())).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Data de Lançamento"), "data de lancamento");
        assert_eq!(normalize_header("  Classe-de-Custo  "), "classe de custo");
        assert_eq!(normalize_header("Valor/Moeda (ACC)"), "valor moeda acc");
        assert_eq!(normalize_header(""), "");
    }

    #[test]
    fn test_resolve_by_header_text() {
        let map = ColumnMap::resolve(&header(&[
            "Classe de custo",
            "Denominação de objeto",
            "Data de lançamento",
            "Valor moed.transação",
            "Valor/moeda ACC",
            "Moeda da transação",
        ]));

        assert_eq!(map.cost_class, 0);
        assert_eq!(map.object_code, 1);
        assert_eq!(map.posting_date, 2);
        assert_eq!(map.value_doc, 3);
        assert_eq!(map.value_local, 4);
        assert_eq!(map.currency_doc, Some(5));
    }

    #[test]
    fn test_resolve_falls_back_to_positions() {
        let map = ColumnMap::resolve(&header(&["A", "B", "C"]));

        assert_eq!(map.posting_date, DEFAULT_POSTING_DATE);
        assert_eq!(map.object_code, DEFAULT_OBJECT_CODE);
        assert_eq!(map.cost_class, DEFAULT_COST_CLASS);
        assert_eq!(map.value_doc, DEFAULT_VALUE_DOC);
        assert_eq!(map.value_local, DEFAULT_VALUE_LOCAL);
        assert_eq!(map.currency_doc, None);
    }

    #[test]
    fn test_first_match_wins_left_to_right() {
        // "objeto" appears twice; the leftmost header takes it.
        let map = ColumnMap::resolve(&header(&["Objeto", "Denominação de objeto"]));
        assert_eq!(map.object_code, 0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let cells = header(&[
            "Data de lançamento",
            "Denominação de objeto",
            "Classe de custo",
            "Valor em Euro",
            "Valor em Reais",
        ]);

        let first = ColumnMap::resolve(&cells);
        let second = ColumnMap::resolve(&cells);
        assert_eq!(first, second);
    }
}
