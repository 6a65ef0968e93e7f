//! Extraction stage.
//!
//! Reads the source file into a [`DataFrame`] whose columns are exactly the
//! source columns, in source order, with every data row in source order.
//!
//! - Spreadsheets (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//!   `calamine` from a named sheet.
//! - Delimited text (`.csv`, `.tsv`, `.txt`) is read with polars' CSV
//!   reader; the sheet name is ignored.

mod delimited;
mod workbook;

use crate::error::{EtlError, Result};
use crate::schema::DIAGNOSTIC_COLUMNS;
use crate::types::LoadReport;
use crate::utils::distinct_values;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Source file formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Delimited { separator: u8 },
}

impl SourceFormat {
    /// Pick the reader from the file extension. Unknown extensions are handed
    /// to the workbook reader, which reports a format error if it cannot
    /// open them.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") | Some("txt") => SourceFormat::Delimited { separator: b',' },
            Some("tsv") => SourceFormat::Delimited { separator: b'\t' },
            _ => SourceFormat::Workbook,
        }
    }
}

/// Loader for the source table.
pub struct DataLoader;

impl DataLoader {
    /// Load `sheet` of the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`EtlError::SourceNotFound`] if `path` does not exist.
    /// - [`EtlError::SourceFormatError`] if the sheet does not exist or the
    ///   file cannot be parsed into a table.
    pub fn load(&self, path: &Path, sheet: &str) -> Result<(DataFrame, LoadReport)> {
        if !path.exists() {
            return Err(EtlError::SourceNotFound(path.to_path_buf()));
        }

        let format = SourceFormat::from_path(path);
        debug!("Reading {} as {:?}", path.display(), format);

        let (df, sheet_used) = match format {
            SourceFormat::Workbook => (workbook::read_sheet(path, sheet)?, Some(sheet.to_string())),
            SourceFormat::Delimited { separator } => {
                (delimited::read_delimited(path, separator)?, None)
            }
        };

        let report = Self::build_report(path, sheet_used, &df)
            .map_err(|e| EtlError::source_format(path, e))?;

        info!(
            "Extraction complete: {} rows, {} columns loaded.",
            report.rows, report.columns
        );
        info!("Source columns: {:?}", report.column_names);
        for (column, values) in &report.diagnostics {
            info!("Unique {}: {:?}", column, values);
        }

        Ok((df, report))
    }

    fn build_report(
        path: &Path,
        sheet: Option<String>,
        df: &DataFrame,
    ) -> PolarsResult<LoadReport> {
        let mut diagnostics = BTreeMap::new();
        for name in DIAGNOSTIC_COLUMNS {
            if let Ok(column) = df.column(name) {
                let values = distinct_values(column.as_materialized_series())?;
                diagnostics.insert(name.to_string(), values);
            } else {
                debug!("Diagnostic column '{}' not in source", name);
            }
        }

        Ok(LoadReport {
            source: path.to_path_buf(),
            sheet,
            rows: df.height(),
            columns: df.width(),
            column_names: df
                .get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a.xlsx")),
            SourceFormat::Workbook
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("a.CSV")),
            SourceFormat::Delimited { separator: b',' }
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("a.tsv")),
            SourceFormat::Delimited { separator: b'\t' }
        );
    }

    #[test]
    fn test_missing_source() {
        let result = DataLoader.load(Path::new("/definitely/not/here.xlsx"), "Sheet1");
        assert!(matches!(result, Err(EtlError::SourceNotFound(_))));
    }

    #[test]
    fn test_load_csv_reports_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Product_Category,Sub_Category,Revenue").unwrap();
        writeln!(file, "Bikes,Road Bikes,100").unwrap();
        writeln!(file, "Accessories,Helmets,20").unwrap();
        writeln!(file, "Bikes,Mountain Bikes,300").unwrap();
        drop(file);

        let (df, report) = DataLoader.load(&path, "ignored").unwrap();

        assert_eq!(df.shape(), (3, 3));
        assert_eq!(report.rows, 3);
        assert_eq!(report.columns, 3);
        assert!(report.sheet.is_none());
        assert_eq!(
            report.diagnostics["Product_Category"],
            vec!["Bikes".to_string(), "Accessories".to_string()]
        );
        assert_eq!(report.diagnostics["Sub_Category"].len(), 3);
    }
}
