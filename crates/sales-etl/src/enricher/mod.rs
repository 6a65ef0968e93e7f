//! Enrichment stage: derived columns, canonical names and the optional row
//! filter.
//!
//! Derived columns are computed from source column names, so they run before
//! the rename. The row filter runs last and is keyed by canonical names.

use crate::cleaner::dates::{normalize_date_series, series_dates};
use crate::config::RowFilter;
use crate::error::EtlError;
use crate::schema::{self, canonical_name};
use crate::types::{RenameRecord, TransformSummary};
use crate::utils::has_column;
use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Data enricher for the cleaned sales table.
#[derive(Debug, Clone, Default)]
pub struct DataEnricher {
    row_filter: Option<RowFilter>,
}

impl DataEnricher {
    pub fn new(row_filter: Option<RowFilter>) -> Self {
        Self { row_filter }
    }

    /// Run every enrichment step in order.
    pub fn enrich(&self, df: DataFrame, summary: &mut TransformSummary) -> Result<DataFrame> {
        info!("Enriching data...");

        let df = self.add_profit_margin(df, summary)?;
        let df = self.add_year_month(df, summary)?;
        let df = self.rename_columns(df, summary)?;
        self.apply_filter(df, summary)
    }

    /// Add `Profit_Margin_%` when both `Profit` and `Revenue` exist.
    ///
    /// A zero revenue gives NaN. A missing or non-numeric operand gives a
    /// missing margin.
    pub fn add_profit_margin(
        &self,
        mut df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        if !has_column(&df, schema::PROFIT) || !has_column(&df, schema::REVENUE) {
            debug!(
                "'{}' or '{}' missing, skipping '{}'",
                schema::PROFIT,
                schema::REVENUE,
                schema::PROFIT_MARGIN
            );
            summary.skip_rule(format!("derive {} (operand absent)", schema::PROFIT_MARGIN));
            return Ok(df);
        }

        let profit = df
            .column(schema::PROFIT)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let revenue = df
            .column(schema::REVENUE)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;

        let margins: Vec<Option<f64>> = profit
            .f64()?
            .into_iter()
            .zip(revenue.f64()?)
            .map(|(p, r)| match (p, r) {
                (Some(p), Some(r)) => Some(profit_margin(p, r)),
                _ => None,
            })
            .collect();

        let undefined = margins.iter().flatten().filter(|m| m.is_nan()).count();
        if undefined > 0 {
            warn!(
                "{} rows have zero '{}'; '{}' is NaN for them",
                undefined,
                schema::REVENUE,
                schema::PROFIT_MARGIN
            );
        }

        df.with_column(Series::new(schema::PROFIT_MARGIN.into(), margins))?;
        summary.derived_columns.push(schema::PROFIT_MARGIN.to_string());
        summary.add_action(format!("Derived '{}'", schema::PROFIT_MARGIN));

        Ok(df)
    }

    /// Add `Year_Month` (`YYYY-MM`) from `Date`. Rows without a date get a
    /// missing value.
    pub fn add_year_month(
        &self,
        mut df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        if !has_column(&df, schema::DATE) {
            debug!("No '{}' column, skipping '{}'", schema::DATE, schema::YEAR_MONTH);
            summary.skip_rule(format!("derive {} (column absent)", schema::YEAR_MONTH));
            return Ok(df);
        }

        let date = df.column(schema::DATE)?.as_materialized_series();
        let (date, _) = normalize_date_series(date)?;

        let year_month: Vec<Option<String>> = series_dates(&date)?
            .into_iter()
            .map(|d| d.map(|d| d.format("%Y-%m").to_string()))
            .collect();

        df.with_column(Series::new(schema::YEAR_MONTH.into(), year_month))?;
        summary.derived_columns.push(schema::YEAR_MONTH.to_string());
        summary.add_action(format!("Derived '{}'", schema::YEAR_MONTH));

        Ok(df)
    }

    /// Apply the canonical rename table.
    ///
    /// Every rename is checked before any is applied, so a conflict leaves
    /// the frame untouched.
    pub fn rename_columns(
        &self,
        mut df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        let planned: Vec<(String, &str)> = df
            .get_column_names()
            .iter()
            .filter_map(|name| {
                canonical_name(name)
                    .filter(|target| *target != name.as_str())
                    .map(|target| (name.to_string(), target))
            })
            .collect();

        for (from, to) in &planned {
            if has_column(&df, to) {
                return Err(EtlError::RenameConflict {
                    source_column: from.to_string(),
                    target_column: to.to_string(),
                }
                .into());
            }
        }

        for (from, to) in planned {
            df.rename(&from, to.into())?;
            debug!("Renamed '{}' -> '{}'", from, to);
            summary.renames.push(RenameRecord {
                from,
                to: to.to_string(),
            });
        }

        if !summary.renames.is_empty() {
            summary.add_action(format!(
                "Renamed {} columns to canonical names",
                summary.renames.len()
            ));
        }

        Ok(df)
    }

    /// Keep only rows matching the configured filter. Disabled by default.
    pub fn apply_filter(&self, df: DataFrame, summary: &mut TransformSummary) -> Result<DataFrame> {
        let Some(filter) = &self.row_filter else {
            return Ok(df);
        };

        if !has_column(&df, &filter.column) {
            warn!(
                "Row filter column '{}' not found, filter skipped",
                filter.column
            );
            summary.skip_rule(format!("filter {} (column absent)", filter.column));
            return Ok(df);
        }

        let text = df
            .column(&filter.column)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let mask: BooleanChunked = text
            .str()?
            .into_iter()
            .map(|v| Some(v == Some(filter.equals.as_str())))
            .collect();

        let before = df.height();
        let df = df.filter(&mask)?;
        let dropped = before - df.height();

        summary.rows_filtered = dropped;
        summary.add_action(format!(
            "Kept rows where '{}' = '{}' ({} rows dropped)",
            filter.column, filter.equals, dropped
        ));
        info!(
            "Row filter {}={} dropped {} rows",
            filter.column, filter.equals, dropped
        );

        Ok(df)
    }
}

/// `round(profit / revenue * 100, 2)`, NaN for zero revenue.
fn profit_margin(profit: f64, revenue: f64) -> f64 {
    if revenue == 0.0 {
        return f64::NAN;
    }
    (profit / revenue * 100.0 * 100.0).round_ties_even() / 100.0
}
