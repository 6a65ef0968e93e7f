//! Median, zero and constant-text imputation.

use crate::utils::{fill_numeric_nulls, fill_string_nulls, is_numeric_dtype};
use anyhow::Result;
use polars::prelude::*;
use tracing::warn;

/// What a fill did to its column.
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    /// Cells that were missing before the fill.
    pub filled: usize,
    /// Of `filled`, present text cells that did not parse as numbers and
    /// were replaced anyway.
    pub overwritten: usize,
    /// The substituted value, rendered as text.
    pub value: String,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing values with the median of the values present before the
    /// fill.
    ///
    /// Text cells that do not parse as numbers count as missing. If the
    /// column has no present values the median is undefined and zero is used.
    pub fn apply_numeric_median(df: &mut DataFrame, col_name: &str) -> Result<FillOutcome> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let numeric = series.cast(&DataType::Float64)?;
        let missing = numeric.null_count();
        let overwritten = missing - series.null_count();

        let median_val = match numeric.median() {
            Some(m) => m,
            None => {
                warn!(
                    "'{}' has no values to take a median of; filling with 0",
                    col_name
                );
                0.0
            }
        };

        if overwritten > 0 {
            warn!(
                "'{}' has {} non-numeric values; replacing them with the median {}",
                col_name, overwritten, median_val
            );
        }

        if missing > 0 || !is_numeric_dtype(series.dtype()) {
            let filled = fill_numeric_nulls(&numeric, median_val)?;
            df.replace(col_name, filled)?;
        }

        Ok(FillOutcome {
            filled: missing,
            overwritten,
            value: format!("{}", median_val),
        })
    }

    /// Fill missing values with zero.
    ///
    /// Numeric columns keep their dtype. Text columns get the text `"0"`.
    pub fn apply_zero(df: &mut DataFrame, col_name: &str) -> Result<FillOutcome> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let missing = series.null_count();

        if missing > 0 {
            let filled = if is_numeric_dtype(series.dtype()) {
                series.fill_null(FillNullStrategy::Zero)?
            } else {
                fill_string_nulls(&series, "0")?
            };
            df.replace(col_name, filled)?;
        }

        Ok(FillOutcome {
            filled: missing,
            overwritten: 0,
            value: "0".to_string(),
        })
    }

    /// Fill missing values with a constant text.
    pub fn apply_constant(df: &mut DataFrame, col_name: &str, value: &str) -> Result<FillOutcome> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let missing = series.null_count();

        if missing > 0 {
            let filled = fill_string_nulls(&series, value)?;
            df.replace(col_name, filled)?;
        }

        Ok(FillOutcome {
            filled: missing,
            overwritten: 0,
            value: value.to_string(),
        })
    }
}
