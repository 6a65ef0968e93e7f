//! Delimited-text sources.

use crate::error::{EtlError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::debug;

/// Read a delimited-text file, retrying without quote handling if the
/// quote-aware parse fails.
pub(super) fn read_delimited(path: &Path, separator: u8) -> Result<DataFrame> {
    let quoted = CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"')),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish());

    match quoted {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Quote-aware parse of {} failed: {}", path.display(), e),
    }

    CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(None),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| EtlError::source_format(path, e))
}
