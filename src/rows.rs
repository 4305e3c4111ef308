use crate::columns::ColumnMap;
use crate::schema::{DateOrder, EntryType};
use crate::sheet::cell_text;
use calamine::Data;
use chrono::{Duration, NaiveDate};
use log::debug;

/// Typed intermediate record produced from one raw spreadsheet row.
/// Downstream stages consume this fixed shape instead of re-deriving
/// field meaning from cell arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntry {
    pub posting_date: NaiveDate,
    pub object_code: String,
    pub cost_class: String,
    pub value_local: f64,
    pub value_doc: f64,
    pub corrected_value_local: f64,
    pub corrected_value_doc: f64,
    pub entry_type: EntryType,
    pub currency_doc: Option<String>,
}

/// Canonical magnitudes and polarity derived from the signed source values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignCorrected {
    pub local: f64,
    pub doc: f64,
    pub entry_type: EntryType,
}

/// The source system posts revenues as negative document-currency values
/// and expenses as positive ones. Aggregation works on non-negative
/// magnitudes, so both currencies are folded to their absolute value and
/// the polarity is kept as a credit/debit tag. Applied unconditionally.
pub fn apply_sign_correction(value_local: f64, value_doc: f64) -> SignCorrected {
    SignCorrected {
        local: value_local.abs(),
        doc: value_doc.abs(),
        entry_type: EntryType::from_document_value(value_doc),
    }
}

/// Converts one raw row into a candidate entry, or `None` to skip it.
///
/// A row is skipped when the posting date, object code or cost class is
/// missing, when both monetary cells are absent, or when no date path
/// can resolve the posting date. Skipping never fails the batch.
pub fn normalize_row(row: &[Data], columns: &ColumnMap, date_order: DateOrder) -> Option<CandidateEntry> {
    let date_cell = present(row, columns.posting_date)?;
    let object_cell = present(row, columns.object_code)?;

    let cost_class = text_at(row, columns.cost_class)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let doc_cell = present(row, columns.value_doc);
    let local_cell = present(row, columns.value_local);
    if doc_cell.is_none() && local_cell.is_none() {
        return None;
    }

    let posting_date = parse_posting_date(date_cell, date_order)?;
    let value_doc = doc_cell.map(parse_amount).unwrap_or(0.0);
    let value_local = local_cell.map(parse_amount).unwrap_or(0.0);
    let corrected = apply_sign_correction(value_local, value_doc);

    let currency_doc = columns
        .currency_doc
        .and_then(|idx| text_at(row, idx))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(CandidateEntry {
        posting_date,
        object_code: cell_text(object_cell).trim().to_string(),
        cost_class,
        value_local,
        value_doc,
        corrected_value_local: corrected.local,
        corrected_value_doc: corrected.doc,
        entry_type: corrected.entry_type,
        currency_doc,
    })
}

/// A cell counts as present when it exists, is not empty, and is not a
/// blank string.
fn present(row: &[Data], idx: usize) -> Option<&Data> {
    match row.get(idx)? {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        cell => Some(cell),
    }
}

fn text_at(row: &[Data], idx: usize) -> Option<String> {
    row.get(idx).map(cell_text)
}

/// Monetary cell to f64. Numeric cells pass through; textual cells go
/// through Brazilian-locale cleanup; anything unparseable becomes zero
/// so the row is still attempted.
pub fn parse_amount(cell: &Data) -> f64 {
    match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::DateTime(dt) => dt.as_f64(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => parse_number_text(s),
        Data::Bool(_) | Data::Error(_) | Data::Empty => 0.0,
    }
}

/// "1.234,56" -> 1234.56. Strips `.` thousands separators, turns the
/// decimal comma into a point, drops any remaining non-numeric
/// characters, then parses. Unparseable text yields zero.
pub fn parse_number_text(raw: &str) -> f64 {
    let mut cleaned = raw.replace('.', "").replace(',', ".");
    cleaned.retain(|c| c.is_ascii_digit() || c == '.' || c == '-');
    cleaned.parse().unwrap_or(0.0)
}

/// Posting-date resolution, in priority order: numeric spreadsheet
/// serials, slash-delimited strings, then generic date strings.
pub fn parse_posting_date(cell: &Data, order: DateOrder) -> Option<NaiveDate> {
    match cell {
        Data::Float(f) => date_from_serial(*f),
        Data::Int(i) => date_from_serial(*i as f64),
        Data::DateTime(dt) => date_from_serial(dt.as_f64()),
        Data::String(s) => parse_date_text(s, order),
        Data::DateTimeIso(s) => parse_date_text(s, order),
        _ => None,
    }
}

/// Days since 1899-12-30, the spreadsheet serial epoch (offset includes
/// the historical 1900 leap-year bug). Fractional time-of-day is dropped.
fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    // Upper bound is well past year 9999, the last date a sheet can hold.
    if !serial.is_finite() || serial <= 0.0 || serial > 3_000_000.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn parse_date_text(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let raw = raw.trim();

    let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
    if parts.len() == 3 {
        if let (Ok(p1), Ok(p2), Ok(year)) = (
            parts[0].parse::<u32>(),
            parts[1].parse::<u32>(),
            parts[2].parse::<i32>(),
        ) {
            // Two-digit years live in the 2000s.
            let year = if parts[2].len() <= 2 { year + 2000 } else { year };

            let (day, month) = if p1 > 12 && p2 <= 12 {
                (p1, p2)
            } else if p2 > 12 && p1 <= 12 {
                (p2, p1)
            } else {
                debug!("ambiguous date ordering in {:?}, applying {:?}", raw, order);
                match order {
                    DateOrder::MonthDay => (p2, p1),
                    DateOrder::DayMonth => (p1, p2),
                }
            };

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
    }

    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    None
}
