//! Persisting the final table.
//!
//! Each target is written to a hidden sibling file first and renamed into
//! place, so a failed write never leaves a truncated target behind. Targets
//! are independent: a failure on one does not touch the other.

use crate::cleaner::dates::series_dates;
use crate::error::{EtlError, Result};
use crate::utils::{DtypeCategory, get_dtype_category};
use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::*;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Text rendering of dates, shared by the CSV target and by spreadsheet
/// cells Excel cannot hold as dates.
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Years an Excel serial date can represent.
const EXCEL_YEARS: std::ops::RangeInclusive<u16> = 1900..=9999;

/// Writes the final table to its output targets.
pub struct OutputWriter;

impl OutputWriter {
    /// Write `df` to an xlsx workbook with a single sheet named `sheet`.
    pub fn write_excel(df: &DataFrame, path: &Path, sheet: &str) -> Result<()> {
        let bytes = workbook_bytes(df, sheet)
            .map_err(|e| EtlError::sink_write(path, format!("{e:#}")))?;

        write_atomically(path, |tmp| {
            fs::write(tmp, &bytes).with_context(|| format!("writing {}", tmp.display()))
        })?;

        info!(
            "Data saved to Excel: {} (sheet '{}', {} rows)",
            path.display(),
            sheet,
            df.height()
        );
        Ok(())
    }

    /// Write `df` as comma-separated text with a header row.
    pub fn write_csv(df: &DataFrame, path: &Path) -> Result<()> {
        let mut out = blank_nan(df).map_err(|e| EtlError::sink_write(path, e))?;

        write_atomically(path, |tmp| {
            let mut file =
                File::create(tmp).with_context(|| format!("creating {}", tmp.display()))?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .with_date_format(Some(DATE_FORMAT.to_string()))
                .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
                .finish(&mut out)?;
            Ok(())
        })?;

        info!("Data saved to CSV: {} ({} rows)", path.display(), df.height());
        Ok(())
    }
}

/// Hidden sibling used as the staging file for `target`.
fn staging_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    target.with_file_name(format!(".{file_name}.tmp"))
}

/// Run `write` against a staging file, then rename it over `target`.
fn write_atomically(
    target: &Path,
    write: impl FnOnce(&Path) -> anyhow::Result<()>,
) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EtlError::sink_write(target, e))?;
    }

    let tmp = staging_path(target);
    debug!("Staging {} at {}", target.display(), tmp.display());

    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(EtlError::sink_write(target, format!("{e:#}")));
    }

    fs::rename(&tmp, target).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        EtlError::sink_write(target, format!("renaming {}: {}", tmp.display(), e))
    })
}

/// Copy of `df` with NaN floats turned into missing values, so both targets
/// show an empty cell for them.
fn blank_nan(df: &DataFrame) -> PolarsResult<DataFrame> {
    let mut out = df.clone();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if !matches!(series.dtype(), DataType::Float32 | DataType::Float64) {
            continue;
        }
        let values: Vec<Option<f64>> = series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        out.replace(series.name().as_str(), Series::new(series.name().clone(), values))?;
    }
    Ok(out)
}

fn workbook_bytes(df: &DataFrame, sheet: &str) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet)?;

    let header = Format::new().set_bold();
    for (idx, column) in df.get_columns().iter().enumerate() {
        let col = u16::try_from(idx).context("too many columns for a worksheet")?;
        worksheet.write_string_with_format(0, col, column.name().as_str(), &header)?;
        write_column(worksheet, col, column.as_materialized_series())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Excel serial value for `dt`, or `None` outside the years Excel supports.
/// Sub-second precision is dropped so both targets show the same instant.
fn excel_datetime(dt: NaiveDateTime) -> Option<ExcelDateTime> {
    let year = u16::try_from(dt.year())
        .ok()
        .filter(|y| EXCEL_YEARS.contains(y))?;
    let month = u8::try_from(dt.month()).ok()?;
    let day = u8::try_from(dt.day()).ok()?;
    let hour = u16::try_from(dt.hour()).ok()?;
    let minute = u8::try_from(dt.minute()).ok()?;

    ExcelDateTime::from_ymd(year, month, day)
        .and_then(|date| date.and_hms(hour, minute, dt.second()))
        .ok()
}

/// Write `dt` as a real date cell, or as ISO text when Excel cannot hold it.
fn write_timestamp(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    dt: NaiveDateTime,
    text_format: &str,
    cell_format: &Format,
) -> anyhow::Result<()> {
    match excel_datetime(dt) {
        Some(value) => {
            worksheet.write_datetime_with_format(row, col, &value, cell_format)?;
        }
        None => {
            debug!("{} is outside Excel's date range, written as text", dt);
            worksheet.write_string(row, col, dt.format(text_format).to_string())?;
        }
    }
    Ok(())
}

/// Timestamps of a `Datetime` series. Zoned series come back as UTC.
fn series_datetimes(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let tz = match series.dtype() {
        DataType::Datetime(_, tz) => tz.clone(),
        _ => None,
    };
    let millis = series
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, tz))?
        .cast(&DataType::Int64)?;

    Ok(millis
        .i64()?
        .into_iter()
        .map(|ms| {
            ms.and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
        })
        .collect())
}

/// Write one column below the header row. Missing and NaN cells stay blank.
fn write_column(worksheet: &mut Worksheet, col: u16, series: &Series) -> anyhow::Result<()> {
    let rows = (1u32..).take(series.len());

    match series.dtype() {
        DataType::Date => {
            let date_format = Format::new().set_num_format("yyyy-mm-dd");
            for (row, date) in rows.zip(series_dates(series)?) {
                if let Some(d) = date {
                    let dt = d.and_time(NaiveTime::MIN);
                    write_timestamp(worksheet, row, col, dt, DATE_FORMAT, &date_format)?;
                }
            }
        }
        DataType::Datetime(_, _) => {
            let stamp_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
            for (row, stamp) in rows.zip(series_datetimes(series)?) {
                if let Some(dt) = stamp {
                    write_timestamp(worksheet, row, col, dt, DATETIME_FORMAT, &stamp_format)?;
                }
            }
        }
        DataType::Boolean => {
            for (row, value) in rows.zip(series.bool()?) {
                if let Some(b) = value {
                    worksheet.write_boolean(row, col, b)?;
                }
            }
        }
        dtype if get_dtype_category(dtype) == DtypeCategory::Numeric => {
            let floats = series.cast(&DataType::Float64)?;
            for (row, value) in rows.zip(floats.f64()?) {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    worksheet.write_number(row, col, v)?;
                }
            }
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            for (row, value) in rows.zip(text.str()?) {
                if let Some(s) = value {
                    worksheet.write_string(row, col, s)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::dates::date_series;
    use chrono::NaiveDate;

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        assert_eq!(
            staging_path(Path::new("out/sales.csv")),
            PathBuf::from("out/.sales.csv.tmp")
        );
    }

    #[test]
    fn test_write_csv_blanks_nan_and_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let df = df![
            "Country" => [Some("France"), None],
            "Profit_Margin_%" => [Some(f64::NAN), Some(25.0)],
        ]
        .unwrap();

        OutputWriter::write_csv(&df, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Country,Profit_Margin_%");
        assert_eq!(lines[1], "France,");
        assert_eq!(lines[2], ",25.0");
        assert!(!staging_path(&path).exists());
    }

    fn sheet_cells(path: &Path) -> Vec<Vec<calamine::Data>> {
        use calamine::{Reader, open_workbook_auto};
        let mut workbook = open_workbook_auto(path).unwrap();
        let range = workbook.worksheet_range("Transformed_Data").unwrap();
        range.rows().map(|row| row.to_vec()).collect()
    }

    #[test]
    fn test_dates_before_1900_are_written_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("out.xlsx");
        let csv = dir.path().join("out.csv");
        let dates = [
            NaiveDate::from_ymd_opt(1850, 3, 1),
            NaiveDate::from_ymd_opt(2023, 7, 15),
        ];
        let df = DataFrame::new(vec![date_series("Date".into(), &dates).unwrap().into()]).unwrap();

        OutputWriter::write_excel(&df, &xlsx, "Transformed_Data").unwrap();
        OutputWriter::write_csv(&df, &csv).unwrap();

        let rows = sheet_cells(&xlsx);
        assert_eq!(rows[1][0], calamine::Data::String("1850-03-01".to_string()));
        assert!(matches!(rows[2][0], calamine::Data::DateTime(_)));
        assert_eq!(
            fs::read_to_string(&csv).unwrap(),
            "Date\n1850-03-01\n2023-07-15\n"
        );
    }

    #[test]
    fn test_datetime_column_matches_in_both_targets() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("out.xlsx");
        let csv = dir.path().join("out.csv");
        let stamp = NaiveDate::from_ymd_opt(2023, 7, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let millis = [Some(stamp.and_utc().timestamp_millis()), None];
        let series = Series::new("Order_Time".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let df = DataFrame::new(vec![series.into()]).unwrap();

        OutputWriter::write_excel(&df, &xlsx, "Transformed_Data").unwrap();
        OutputWriter::write_csv(&df, &csv).unwrap();

        let rows = sheet_cells(&xlsx);
        match &rows[1][0] {
            calamine::Data::DateTime(value) => assert_eq!(value.as_datetime(), Some(stamp)),
            other => panic!("expected a datetime cell, got {other:?}"),
        }
        assert_eq!(
            fs::read_to_string(&csv).unwrap(),
            "Order_Time\n2023-07-15 10:30:00\n\n"
        );
    }

    #[test]
    fn test_excel_datetime_range() {
        let at = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN);
        assert!(excel_datetime(at(1900, 1, 1)).is_some());
        assert!(excel_datetime(at(9999, 12, 31)).is_some());
        assert!(excel_datetime(at(1899, 12, 31)).is_none());
        assert!(excel_datetime(at(-44, 3, 15)).is_none());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.xlsx");
        let df = df!["Quantity" => [1, 2]].unwrap();

        OutputWriter::write_excel(&df, &path, "Transformed_Data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_to_directory_fails_with_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let df = df!["Quantity" => [1]].unwrap();

        let err = OutputWriter::write_csv(&df, dir.path()).unwrap_err();
        assert_eq!(err.failed_target(), Some(&dir.path().to_path_buf()));
    }

    #[test]
    fn test_invalid_sheet_name_fails_with_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let df = df!["Quantity" => [1]].unwrap();

        let err = OutputWriter::write_excel(&df, &path, "bad[name]").unwrap_err();
        assert!(matches!(err, EtlError::SinkWriteError { .. }));
        assert!(!path.exists());
    }
}
