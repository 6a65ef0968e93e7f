//! Configuration types for the ETL pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! Defaults reproduce the fixed input/output locations of the legacy
//! batch job, so `EtlConfig::default()` runs it unchanged.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default source workbook.
pub const DEFAULT_INPUT: &str = "Car_sales_modified - Copy.xlsx";
/// Default source sheet.
pub const DEFAULT_SHEET: &str = "Sheet1";
/// Default spreadsheet output.
pub const DEFAULT_EXCEL_OUTPUT: &str = "Cars_sales_ETL_transformed.xlsx";
/// Default delimited-text output.
pub const DEFAULT_CSV_OUTPUT: &str = "Cars_sales_ETL_transformed.csv";
/// Sheet name used in the spreadsheet output.
pub const DEFAULT_OUTPUT_SHEET: &str = "Transformed_Data";

/// Excel rejects these characters in worksheet names.
const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
const MAX_SHEET_NAME_LEN: usize = 31;

/// Optional row filter applied after enrichment.
///
/// Keeps only the rows whose `column` cell, rendered as text, equals
/// `equals`. Missing cells never match. The filter is evaluated against the
/// canonical (renamed) column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub equals: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, equals: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            equals: equals.into(),
        }
    }

    /// Parse a `COLUMN=VALUE` expression.
    pub fn parse(expr: &str) -> Result<Self, ConfigValidationError> {
        match expr.split_once('=') {
            Some((column, value)) if !column.trim().is_empty() => {
                Ok(Self::new(column.trim(), value.trim()))
            }
            _ => Err(ConfigValidationError::InvalidFilter(expr.to_string())),
        }
    }
}

/// Configuration for a single ETL run.
///
/// Use [`EtlConfig::builder()`] to create a new configuration with a
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::config::{EtlConfig, RowFilter};
///
/// let config = EtlConfig::builder()
///     .input_path("data/sales.xlsx")
///     .csv_output("out/sales.csv")
///     .row_filter(RowFilter::new("Country", "United States"))
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Source spreadsheet or delimited-text file.
    pub input_path: PathBuf,

    /// Sheet to read from a spreadsheet source. Ignored for CSV sources.
    /// Default: "Sheet1"
    pub sheet_name: String,

    /// Destination of the spreadsheet output.
    pub excel_output: PathBuf,

    /// Destination of the delimited-text output.
    pub csv_output: PathBuf,

    /// Worksheet name in the spreadsheet output.
    /// Default: "Transformed_Data"
    pub output_sheet_name: String,

    /// Number of rows shown in the console preview.
    /// Default: 5
    pub preview_rows: usize,

    /// Row filter, disabled by default.
    #[serde(default)]
    pub row_filter: Option<RowFilter>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT),
            sheet_name: DEFAULT_SHEET.to_string(),
            excel_output: PathBuf::from(DEFAULT_EXCEL_OUTPUT),
            csv_output: PathBuf::from(DEFAULT_CSV_OUTPUT),
            output_sheet_name: DEFAULT_OUTPUT_SHEET.to_string(),
            preview_rows: 5,
            row_filter: None,
        }
    }
}

impl EtlConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.sheet_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptySheetName);
        }

        let out = &self.output_sheet_name;
        if out.trim().is_empty()
            || out.chars().count() > MAX_SHEET_NAME_LEN
            || out.contains(INVALID_SHEET_CHARS)
        {
            return Err(ConfigValidationError::InvalidOutputSheet(out.clone()));
        }

        if self.excel_output == self.csv_output {
            return Err(ConfigValidationError::SameOutputPath(
                self.csv_output.clone(),
            ));
        }

        if let Some(filter) = &self.row_filter
            && filter.column.trim().is_empty()
        {
            return Err(ConfigValidationError::InvalidFilter(format!(
                "={}",
                filter.equals
            )));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Source sheet name must not be empty")]
    EmptySheetName,

    #[error("Invalid output sheet name '{0}' (1-31 characters, none of []:*?/\\)")]
    InvalidOutputSheet(String),

    #[error("Spreadsheet and CSV outputs both point to '{}'", .0.display())]
    SameOutputPath(PathBuf),

    #[error("Invalid row filter '{0}' (expected COLUMN=VALUE)")]
    InvalidFilter(String),
}

/// Builder for [`EtlConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    input_path: Option<PathBuf>,
    sheet_name: Option<String>,
    excel_output: Option<PathBuf>,
    csv_output: Option<PathBuf>,
    output_sheet_name: Option<String>,
    preview_rows: Option<usize>,
    row_filter: Option<RowFilter>,
}

impl EtlConfigBuilder {
    /// Set the source file.
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Set the sheet to read from a spreadsheet source.
    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    /// Set the spreadsheet output path.
    pub fn excel_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.excel_output = Some(path.into());
        self
    }

    /// Set the delimited-text output path.
    pub fn csv_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.csv_output = Some(path.into());
        self
    }

    /// Set the worksheet name written to the spreadsheet output.
    pub fn output_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.output_sheet_name = Some(name.into());
        self
    }

    /// Set how many rows the console preview shows.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Enable the row filter.
    pub fn row_filter(mut self, filter: RowFilter) -> Self {
        self.row_filter = Some(filter);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EtlConfig` or an error if validation fails.
    pub fn build(self) -> Result<EtlConfig, ConfigValidationError> {
        let defaults = EtlConfig::default();
        let config = EtlConfig {
            input_path: self.input_path.unwrap_or(defaults.input_path),
            sheet_name: self.sheet_name.unwrap_or(defaults.sheet_name),
            excel_output: self.excel_output.unwrap_or(defaults.excel_output),
            csv_output: self.csv_output.unwrap_or(defaults.csv_output),
            output_sheet_name: self
                .output_sheet_name
                .unwrap_or(defaults.output_sheet_name),
            preview_rows: self.preview_rows.unwrap_or(defaults.preview_rows),
            row_filter: self.row_filter,
        };

        config.validate()?;
        Ok(config)
    }
}
