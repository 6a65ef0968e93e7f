//! Sales Spreadsheet ETL Library
//!
//! A batch extract-transform-load pipeline for a sales workbook, built with
//! Rust and Polars.
//!
//! # Overview
//!
//! Data flows strictly Loader → Cleaner → Enricher → Writer, each stage
//! taking ownership of the table and handing it to the next:
//!
//! - **Loading**: reads one sheet of a spreadsheet (or a CSV file) and
//!   reports its shape and the distinct product categories
//! - **Cleaning**: lenient date parsing, exact-duplicate removal, and a
//!   fixed per-column missing-value policy
//! - **Enriching**: `Profit_Margin_%` and `Year_Month` derivation, canonical
//!   column names, an optional row filter
//! - **Writing**: an xlsx workbook and a CSV file with identical contents,
//!   followed by descriptive statistics and a preview
//!
//! Columns named by a policy may be absent from the source; their rules are
//! skipped rather than failed.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sales_etl::{EtlConfig, Pipeline};
//!
//! let config = EtlConfig::builder()
//!     .input_path("Car_sales.xlsx")
//!     .sheet_name("Sheet1")
//!     .excel_output("out/transformed.xlsx")
//!     .csv_output("out/transformed.csv")
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! println!("{}", result.preview);
//! ```
//!
//! # In-memory transforms
//!
//! [`Pipeline::transform`] runs the Cleaner and Enricher over a
//! [`polars::prelude::DataFrame`] without touching the filesystem:
//!
//! ```rust,ignore
//! let (df, summary) = Pipeline::builder().build()?.transform(df)?;
//! assert_eq!(summary.rows_after, summary.rows_before - summary.duplicates_removed);
//! ```

pub mod cleaner;
pub mod config;
pub mod enricher;
pub mod error;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{ConfigValidationError, EtlConfig, EtlConfigBuilder, RowFilter};
pub use enricher::DataEnricher;
pub use error::EtlError;
pub use imputers::{FillOutcome, StatisticalImputer};
pub use loader::{DataLoader, SourceFormat};
pub use pipeline::{
    ClosureProgressReporter, EtlStage, Pipeline, PipelineBuilder, ProgressReporter,
    ProgressUpdate,
};
pub use reporting::{ColumnStatistics, OutputWriter, describe, preview, render_statistics};
pub use types::{
    EtlResult, FillRecord, LoadReport, OutputFiles, RenameRecord, TransformSummary,
};
pub use utils::{
    DtypeCategory, distinct_values, fill_numeric_nulls, fill_string_nulls, get_dtype_category,
    is_numeric_dtype,
};
