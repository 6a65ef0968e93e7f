use crate::reporting::ColumnStatistics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What the loader saw in the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub source: PathBuf,
    /// Sheet the table was read from; `None` for delimited-text sources.
    pub sheet: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    /// Distinct values of the diagnostic columns present in the source,
    /// in order of first appearance.
    pub diagnostics: BTreeMap<String, Vec<String>>,
}

/// One applied fill rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecord {
    pub column: String,
    /// Rule name: `median`, `zero` or `text`.
    pub rule: String,
    /// The value substituted, rendered as text.
    pub value: String,
    /// Number of cells that were missing and got filled.
    pub filled: usize,
    /// Present but unparseable cells among `filled`.
    #[serde(default)]
    pub overwritten: usize,
}

/// One applied rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRecord {
    pub from: String,
    pub to: String,
}

/// Record of everything the Cleaner and Enricher did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformSummary {
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,

    pub duplicates_removed: usize,
    /// Date cells present in the source that could not be parsed.
    pub unparsed_dates: usize,
    pub fills: Vec<FillRecord>,
    pub derived_columns: Vec<String>,
    pub renames: Vec<RenameRecord>,
    /// Rows dropped by the optional row filter.
    pub rows_filtered: usize,
    /// Rules that were skipped because their column is absent.
    pub skipped_rules: Vec<String>,

    /// Human-readable log of the actions taken, in order.
    pub actions: Vec<String>,
}

impl TransformSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub fn skip_rule(&mut self, rule: impl Into<String>) {
        self.skipped_rules.push(rule.into());
    }

    /// Total number of cells filled across all policy columns.
    pub fn total_filled(&self) -> usize {
        self.fills.iter().map(|f| f.filled).sum()
    }
}

/// Paths the writer produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFiles {
    pub excel: PathBuf,
    pub excel_sheet: String,
    pub csv: PathBuf,
}

/// Result of a complete ETL run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlResult {
    pub load: LoadReport,
    pub transform: TransformSummary,
    pub outputs: OutputFiles,
    /// Final frame shape (rows, columns).
    pub shape: (usize, usize),
    pub column_names: Vec<String>,
    /// First rows of the final table, rendered for the console.
    pub preview: String,
    pub statistics: Vec<ColumnStatistics>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_filled() {
        let mut summary = TransformSummary::new();
        summary.fills.push(FillRecord {
            column: "Country".to_string(),
            rule: "text".to_string(),
            value: "Unknown".to_string(),
            filled: 2,
            overwritten: 0,
        });
        summary.fills.push(FillRecord {
            column: "Profit".to_string(),
            rule: "zero".to_string(),
            value: "0".to_string(),
            filled: 3,
            overwritten: 0,
        });
        assert_eq!(summary.total_filled(), 5);
    }

    #[test]
    fn test_summary_serialization() {
        let mut summary = TransformSummary::new();
        summary.add_action("Removed 1 duplicate rows");
        summary.skip_rule("fill Customer_Age (column absent)");

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("duplicate"));
        assert!(json.contains("skipped_rules"));
    }
}
