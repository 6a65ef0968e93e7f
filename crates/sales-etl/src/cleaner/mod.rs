//! Data cleaning stage.
//!
//! Applied in a fixed order:
//! 1. Normalizing the `Date` column to calendar dates
//! 2. Removing exact duplicate rows (first occurrence kept, order preserved)
//! 3. Filling missing values per the column fill policy
//!
//! A rule whose column is absent from the source is skipped, not failed.

pub mod dates;

use crate::imputers::StatisticalImputer;
use crate::schema::{self, FILL_POLICY, FillRule};
use crate::types::{FillRecord, TransformSummary};
use crate::utils::has_column;
use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Data cleaner for the sales table.
pub struct DataCleaner;

impl DataCleaner {
    /// Run every cleaning step, taking ownership of the frame and returning
    /// the cleaned one.
    pub fn clean(&self, df: DataFrame, summary: &mut TransformSummary) -> Result<DataFrame> {
        info!("Performing data cleaning...");

        let df = self.normalize_dates(df, summary)?;
        let df = self.remove_duplicates(df, summary)?;
        self.fill_missing(df, summary)
    }

    /// Parse the `Date` column into calendar dates. Cells that cannot be
    /// parsed become missing.
    pub fn normalize_dates(
        &self,
        mut df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        if !has_column(&df, schema::DATE) {
            debug!("No '{}' column, skipping date normalization", schema::DATE);
            summary.skip_rule(format!("normalize {} (column absent)", schema::DATE));
            return Ok(df);
        }

        let series = df.column(schema::DATE)?.as_materialized_series().clone();
        let (normalized, unparsed) = dates::normalize_date_series(&series)?;
        df.replace(schema::DATE, normalized)?;

        summary.unparsed_dates = unparsed;
        if unparsed > 0 {
            warn!(
                "{} '{}' values could not be parsed and are now missing",
                unparsed,
                schema::DATE
            );
            summary.add_action(format!(
                "Normalized '{}' ({} unparseable values set to missing)",
                schema::DATE,
                unparsed
            ));
        } else {
            summary.add_action(format!("Normalized '{}'", schema::DATE));
        }

        Ok(df)
    }

    /// Remove rows that equal an earlier row across all columns.
    pub fn remove_duplicates(
        &self,
        df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        let before = df.height();
        if df.width() == 0 {
            return Ok(df);
        }

        let df = df
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?;
        let removed = before - df.height();

        summary.duplicates_removed += removed;
        if removed > 0 {
            let pct = (removed as f64 / before as f64) * 100.0;
            summary.add_action(format!(
                "Removed {} duplicate rows ({:.1}%)",
                removed, pct
            ));
            debug!("Removed {} duplicate rows", removed);
        } else {
            summary.add_action("No duplicate rows found");
            debug!("No duplicate rows found");
        }

        Ok(df)
    }

    /// Apply the fill policy. Columns outside the policy are never touched.
    pub fn fill_missing(
        &self,
        mut df: DataFrame,
        summary: &mut TransformSummary,
    ) -> Result<DataFrame> {
        for (column, rule) in FILL_POLICY {
            if !has_column(&df, column) {
                debug!("No '{}' column, skipping its fill rule", column);
                summary.skip_rule(format!("fill {} (column absent)", column));
                continue;
            }

            let (outcome, rule_name) = match rule {
                FillRule::Median => (
                    StatisticalImputer::apply_numeric_median(&mut df, column)?,
                    "median",
                ),
                FillRule::Zero => (StatisticalImputer::apply_zero(&mut df, column)?, "zero"),
                FillRule::Text(text) => (
                    StatisticalImputer::apply_constant(&mut df, column, text)?,
                    "text",
                ),
            };

            if outcome.filled > 0 {
                summary.add_action(format!(
                    "Filled {} missing '{}' values with {}: {}",
                    outcome.filled, column, rule_name, outcome.value
                ));
            }
            if outcome.overwritten > 0 {
                summary.add_action(format!(
                    "Replaced {} non-numeric '{}' values with {}: {}",
                    outcome.overwritten, column, rule_name, outcome.value
                ));
            }
            debug!(
                "Fill '{}' ({}): {} cells with {}",
                column, rule_name, outcome.filled, outcome.value
            );

            summary.fills.push(FillRecord {
                column: column.to_string(),
                rule: rule_name.to_string(),
                value: outcome.value,
                filled: outcome.filled,
                overwritten: outcome.overwritten,
            });
        }

        Ok(df)
    }
}
