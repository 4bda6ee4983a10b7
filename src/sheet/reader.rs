use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use std::path::Path;

use super::types::*;
use crate::error::{CompileError, Result};

/// Read every sheet described by `source` into grids.
///
/// Workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`) yield one sheet per worksheet, named after the
/// worksheet; `.csv` files yield a single sheet named after the file stem.
pub fn read_sheets(source: &SheetSource) -> Result<Vec<Sheet>> {
    let path = source.path.as_path();

    if !path.exists() {
        return Err(CompileError::read_error(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        let name = file_stem(path)?;
        let grid = read_csv_grid(path)?;
        return Ok(vec![Sheet::new(name, source.kind, grid)]);
    }

    read_workbook(path, source)
}

fn read_workbook(path: &Path, source: &SheetSource) -> Result<Vec<Sheet>> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| {
        CompileError::read_error(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let targets: Vec<String> = match &source.anchor {
        Some(anchor) => {
            if !sheet_names.iter().any(|n| n == anchor) {
                return Err(CompileError::read_error(format!(
                    "Sheet not found: {}@{}",
                    path.display(),
                    anchor
                )));
            }
            vec![anchor.clone()]
        }
        None => sheet_names,
    };

    let mut sheets = Vec::with_capacity(targets.len());
    for name in targets {
        let range = workbook.worksheet_range(&name).map_err(|e| {
            CompileError::read_error(format!("Failed to read sheet '{}': {}", name, e))
        })?;
        sheets.push(Sheet::new(name, source.kind, range_to_grid(&range)));
    }

    Ok(sheets)
}

/// Place the used cells of a range at their absolute positions.
fn range_to_grid(range: &Range<Data>) -> SheetGrid {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (height, width) = range.get_size();

    let total_rows = start_row as usize + height;
    let total_cols = start_col as usize + width;
    let mut rows = vec![vec![CellValue::Empty; total_cols]; total_rows];

    for (row, col, data) in range.used_cells() {
        let abs_row = start_row as usize + row;
        let abs_col = start_col as usize + col;
        rows[abs_row][abs_col] = convert_cell_value(data);
    }

    SheetGrid::new(rows)
}

/// Convert calamine Data to our CellValue
fn convert_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => CellValue::DateTime(format_excel_datetime(dt.as_f64())),
        Data::DateTimeIso(s) => CellValue::DateTime(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
    }
}

/// Format spreadsheet datetime (days since 1899-12-30) to ISO 8601. Rounds to the
/// nearest second, which may carry into the next day.
pub fn format_excel_datetime(value: f64) -> String {
    let total_seconds = (value * 86400.0).round() as i64;
    let midnight = chrono::NaiveDateTime::new(excel_epoch(), chrono::NaiveTime::default());
    let datetime = midnight
        .checked_add_signed(chrono::Duration::seconds(total_seconds))
        .unwrap_or(midnight);

    datetime.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Spreadsheet day zero
pub fn excel_epoch() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

fn read_csv_grid(path: &Path) -> Result<SheetGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            CompileError::read_error(format!("Failed to open {}: {}", path.display(), e))
        })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            CompileError::read_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        rows.push(record.iter().map(String::from).collect::<Vec<_>>());
    }

    Ok(SheetGrid::from_text_rows(rows))
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            CompileError::read_error(format!("Cannot derive a sheet name from {}", path.display()))
        })
}
