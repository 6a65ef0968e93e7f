//! Spreadsheet sources read through `calamine`.

use crate::cleaner::dates::{date_series, parse_lenient};
use crate::error::{EtlError, Result};
use calamine::{Data, Reader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Largest float that still converts to `i64` without losing integrality.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Read one sheet into a frame: first row is the header, every following
/// row is data.
pub(super) fn read_sheet(path: &Path, sheet: &str) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| EtlError::source_format(path, e))?;

    let sheet_names = workbook.sheet_names();
    if !sheet_names.iter().any(|name| name == sheet) {
        return Err(EtlError::source_format(
            path,
            format!(
                "sheet '{}' not found (available: {})",
                sheet,
                sheet_names.join(", ")
            ),
        ));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| EtlError::source_format(path, e))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| EtlError::source_format(path, format!("sheet '{}' is empty", sheet)))?;
    let names = header_names(header);

    let mut cells: Vec<Vec<&Data>> = vec![Vec::with_capacity(range.height()); names.len()];
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(names.len()) {
            cells[idx].push(cell);
        }
    }

    debug!(
        "Sheet '{}': {} header cells, {} data rows",
        sheet,
        names.len(),
        cells.first().map_or(0, Vec::len)
    );

    let columns = names
        .iter()
        .zip(&cells)
        .map(|(name, column_cells)| build_column(name, column_cells).map(Column::from))
        .collect::<PolarsResult<Vec<Column>>>()
        .map_err(|e| EtlError::source_format(path, e))?;

    DataFrame::new(columns).map_err(|e| EtlError::source_format(path, e))
}

/// Header labels with blanks named `Unnamed: {index}` and repeats suffixed
/// `.1`, `.2`, ... so every column name is unique.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();

    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Data::Empty | Data::Error(_) => String::new(),
                other => other.to_string().trim().to_string(),
            };
            let base = if base.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                base
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

/// What a column's present cells have in common.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Empty,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Text,
}

impl CellKind {
    fn merge(self, other: CellKind) -> CellKind {
        use CellKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            (Date, DateTime) | (DateTime, Date) => DateTime,
            _ => Text,
        }
    }
}

fn cell_datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime(),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .or_else(|| parse_lenient(s).map(|d| d.and_time(NaiveTime::MIN))),
        _ => None,
    }
}

fn is_missing(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_kind(cell: &Data) -> CellKind {
    if is_missing(cell) {
        return CellKind::Empty;
    }
    match cell {
        Data::Int(_) => CellKind::Integer,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => CellKind::Integer,
        Data::Float(_) => CellKind::Float,
        Data::Bool(_) => CellKind::Boolean,
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell_datetime(cell) {
            Some(dt) if dt.time() == NaiveTime::MIN => CellKind::Date,
            Some(_) => CellKind::DateTime,
            None => CellKind::Text,
        },
        _ => CellKind::Text,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    if is_missing(cell) {
        return None;
    }
    match cell {
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell_datetime(cell) {
            Some(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(cell.to_string()),
        },
        other => Some(other.to_string()),
    }
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

/// Build a typed series from one column of cells.
fn build_column(name: &str, cells: &[&Data]) -> PolarsResult<Series> {
    let kind = cells
        .iter()
        .fold(CellKind::Empty, |acc, cell| acc.merge(cell_kind(cell)));
    let name: PlSmallStr = name.into();

    match kind {
        CellKind::Integer => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    Data::Int(i) => Some(*i),
                    Data::Float(f) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            Ok(Series::new(name, values))
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells.iter().map(|cell| cell_f64(cell)).collect();
            Ok(Series::new(name, values))
        }
        CellKind::Boolean => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|cell| match cell {
                    Data::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Ok(Series::new(name, values))
        }
        CellKind::Date => {
            let values: Vec<Option<NaiveDate>> = cells
                .iter()
                .map(|cell| cell_datetime(cell).map(|dt| dt.date()))
                .collect();
            date_series(name, &values)
        }
        CellKind::DateTime => {
            let millis: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| cell_datetime(cell).map(|dt| dt.and_utc().timestamp_millis()))
                .collect();
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        }
        CellKind::Empty | CellKind::Text => {
            let values: Vec<Option<String>> = cells.iter().map(|cell| cell_text(cell)).collect();
            Ok(Series::new(name, values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_dedup_and_blanks() {
        let header = vec![
            Data::String("Date".to_string()),
            Data::Empty,
            Data::String("Profit".to_string()),
            Data::String("Profit".to_string()),
        ];
        assert_eq!(
            header_names(&header),
            vec!["Date", "Unnamed: 1", "Profit", "Profit.1"]
        );
    }

    #[test]
    fn test_integral_floats_load_as_integers() {
        let cells = [Data::Float(19.0), Data::Empty, Data::Int(3)];
        let refs: Vec<&Data> = cells.iter().collect();
        let series = build_column("Order_Quantity", &refs).unwrap();

        assert_eq!(series.dtype(), &DataType::Int64);
        assert_eq!(series.null_count(), 1);
    }

    #[test]
    fn test_fractional_floats_load_as_float() {
        let cells = [Data::Float(1.5), Data::Int(2)];
        let refs: Vec<&Data> = cells.iter().collect();
        let series = build_column("Unit_Cost", &refs).unwrap();
        assert_eq!(series.dtype(), &DataType::Float64);
    }

    #[test]
    fn test_mixed_cells_load_as_text() {
        let cells = [
            Data::String("abc".to_string()),
            Data::Int(5),
            Data::String("   ".to_string()),
        ];
        let refs: Vec<&Data> = cells.iter().collect();
        let series = build_column("State", &refs).unwrap();

        let values: Vec<Option<&str>> = series.str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("abc"), Some("5"), None]);
    }

    #[test]
    fn test_iso_date_cells_load_as_date() {
        let cells = [
            Data::DateTimeIso("2023-07-15T00:00:00".to_string()),
            Data::Empty,
        ];
        let refs: Vec<&Data> = cells.iter().collect();
        let series = build_column("Date", &refs).unwrap();
        assert_eq!(series.dtype(), &DataType::Date);
    }

    #[test]
    fn test_empty_column_loads_as_text_nulls() {
        let cells = [Data::Empty, Data::Empty];
        let refs: Vec<&Data> = cells.iter().collect();
        let series = build_column("Country", &refs).unwrap();

        assert_eq!(series.dtype(), &DataType::String);
        assert_eq!(series.null_count(), 2);
    }
}
