//! Output targets and human-facing reports.
//!
//! [`OutputWriter`] persists the final table to the workbook and CSV
//! targets. [`describe`] and [`preview`] summarize it for the console; they
//! never change what was written.
//!
//! # Example
//!
//! ```rust,ignore
//! use sales_etl::reporting::{OutputWriter, describe, render_statistics};
//!
//! OutputWriter::write_excel(&df, Path::new("out.xlsx"), "Transformed_Data")?;
//! OutputWriter::write_csv(&df, Path::new("out.csv"))?;
//!
//! println!("{}", render_statistics(&describe(&df)?));
//! ```

mod statistics;
mod writer;

pub use statistics::{ColumnStatistics, describe, preview, render_statistics};
pub use writer::OutputWriter;
