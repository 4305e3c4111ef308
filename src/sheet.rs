use crate::error::{DreBuilderError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// First worksheet of an upload, split into header row and data rows.
#[derive(Debug, Clone)]
pub struct SheetData {
    pub header: Vec<Data>,
    pub rows: Vec<Vec<Data>>,
}

/// Reads the first worksheet of a workbook held in memory. The first row
/// is the header; a sheet without at least one data row below it is
/// rejected before any row processing starts.
pub fn read_first_sheet(bytes: &[u8]) -> Result<SheetData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DreBuilderError::EmptySheet)?;

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let header = rows.next().ok_or(DreBuilderError::EmptySheet)?.to_vec();
    let data: Vec<Vec<Data>> = rows.map(|r| r.to_vec()).collect();

    if data.is_empty() {
        return Err(DreBuilderError::EmptySheet);
    }

    Ok(SheetData { header, rows: data })
}

/// Plain-text view of a cell. Non-text cells render through their
/// display form; empty cells render as the empty string.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => format!("{}", f),
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => format!("{}", b),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}
