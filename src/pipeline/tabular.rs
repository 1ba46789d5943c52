//! Tabular-file adapter: spreadsheet bytes → store orders.
//!
//! The workbook is decoded with `calamine`, which sniffs the container
//! format (xlsx/xlsm/xlsb/xls/ods) from the bytes themselves. Only the first
//! sheet is read. Cells are coerced to text here so the grouping normaliser
//! never sees spreadsheet types.
//!
//! ## Absolute addressing
//!
//! `calamine` ranges start at the first *used* cell. A sheet whose data
//! begins at `B3` would otherwise shift every column index by one, so the
//! decoded rows are padded back to column `A`. The first used row stays the
//! header row.

use crate::error::DispatchError;
use crate::model::StoreOrder;
use crate::pipeline::group::{group_rows, GroupingPolicy};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use tracing::{debug, info};

/// Decode the first sheet of a workbook into raw, A1-anchored rows.
///
/// The header row is *included*; dropping it is the grouping policy's job.
pub fn decode_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<Data>>, DispatchError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        DispatchError::WorkbookUnreadable {
            detail: e.to_string(),
        }
    })?;

    let sheet_names = workbook.sheet_names();
    let first = sheet_names.first().cloned().ok_or(DispatchError::NoSheets)?;
    debug!("Workbook sheets: {:?}; reading '{}'", sheet_names, first);

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| DispatchError::WorkbookUnreadable {
            detail: format!("sheet '{first}': {e}"),
        })?;

    Ok(anchor_rows(&range))
}

/// Parse spreadsheet bytes into store orders.
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<StoreOrder>, DispatchError> {
    let rows = decode_first_sheet(bytes)?;
    let stores = parse_rows(&rows);
    info!("Workbook: {} rows → {} stores", rows.len(), stores.len());
    Ok(stores)
}

/// Group already-decoded rows (header row included) into store orders.
pub fn parse_rows(rows: &[Vec<Data>]) -> Vec<StoreOrder> {
    let text_rows = rows
        .iter()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    group_rows(text_rows, GroupingPolicy::tabular())
}

/// Coerce one raw cell to the text a user sees when the sheet is printed
/// without formatting.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        // Excel serial date, as a raw number.
        Data::DateTime(dt) => format_number(dt.as_f64()),
    }
}

fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

/// Pad columns back to `A`. Rows are left alone so the first used row is
/// still the header.
fn anchor_rows(range: &Range<Data>) -> Vec<Vec<Data>> {
    let (_, col0) = range.start().unwrap_or((0, 0));
    range
        .rows()
        .map(|row| {
            let mut cells = vec![Data::Empty; col0 as usize];
            cells.extend_from_slice(row);
            cells
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    fn data_row(code: &str, qty: Data, id: &str) -> Vec<Data> {
        vec![
            text(code),
            text("Store A"),
            text("Wall"),
            text("A"),
            text("Pt1"),
            text("Rack"),
            text("M"),
            Data::Int(100),
            Data::Int(200),
            Data::Int(110),
            Data::Int(210),
            text("Vinyl"),
            qty,
            text(id),
            text("UV"),
        ]
    }

    #[test]
    fn header_then_one_row_yields_one_store() {
        let mut header = vec![text("POS Code"), text("Name")];
        header.resize(15, Data::Empty);
        let rows = vec![header, data_row("P001", Data::Float(5.0), "IMG1")];

        let stores = parse_rows(&rows);
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].pos_code, "P001");
        assert_eq!(stores[0].items.len(), 1);
        assert_eq!(stores[0].items[0].quantity, 5);
        assert_eq!(stores[0].items[0].id, "IMG1");
        assert_eq!(stores[0].items[0].width, "100");
    }

    #[test]
    fn header_literal_in_data_area_is_ignored() {
        let rows = vec![
            vec![text("anything")],
            data_row("POS Code", Data::Int(1), "X"),
            data_row("店铺编号", Data::Int(1), "X"),
            data_row("p002", Data::Int(1), "Y"),
        ];
        let stores = parse_rows(&rows);
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].pos_code, "p002");
    }

    #[test]
    fn non_numeric_quantity_defaults_to_zero() {
        let rows = vec![
            vec![],
            data_row("P001", text("n/a"), "A"),
            data_row("P001", Data::Empty, "B"),
        ];
        let stores = parse_rows(&rows);
        assert!(stores[0].items.iter().all(|i| i.quantity == 0));
    }

    #[test]
    fn cell_text_coercion() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::Float(5.0)), "5");
        assert_eq!(cell_text(&Data::Float(12.5)), "12.5");
        assert_eq!(cell_text(&Data::Bool(true)), "true");
        assert_eq!(cell_text(&text("  P001 ")), "  P001 ");
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let err = parse_workbook(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, DispatchError::WorkbookUnreadable { .. }), "got {err:?}");
    }
}
