//! Fixed column policies for the sales dataset.
//!
//! Every rule here is keyed by source column name. Rules whose column is
//! absent from a given source are skipped, never failed: the schema of the
//! input workbook is allowed to vary.

use serde::Serialize;

pub const DATE: &str = "Date";
pub const CUSTOMER_AGE: &str = "Customer_Age";
pub const AGE_GROUP: &str = "Age_Group";
pub const CUSTOMER_GENDER: &str = "Customer_Gender";
pub const COUNTRY: &str = "Country";
pub const STATE: &str = "State";
pub const PRODUCT_CATEGORY: &str = "Product_Category";
pub const SUB_CATEGORY: &str = "Sub_Category";
pub const ORDER_QUANTITY: &str = "Order_Quantity";
pub const PROFIT: &str = "Profit";
pub const REVENUE: &str = "Revenue";

/// Derived column: profit as a percentage of revenue.
pub const PROFIT_MARGIN: &str = "Profit_Margin_%";
/// Derived column: `YYYY-MM` of the order date.
pub const YEAR_MONTH: &str = "Year_Month";

/// Text used to fill missing categorical values.
pub const UNKNOWN: &str = "Unknown";

/// Columns whose distinct values are logged after loading.
pub const DIAGNOSTIC_COLUMNS: [&str; 2] = [PRODUCT_CATEGORY, SUB_CATEGORY];

/// How a missing cell in a policy column is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "rule", content = "value")]
pub enum FillRule {
    /// Median of the values present before filling.
    Median,
    /// Literal zero.
    Zero,
    /// Literal text.
    Text(&'static str),
}

/// Per-column missing-value policy, applied in this order.
pub const FILL_POLICY: [(&str, FillRule); 8] = [
    (CUSTOMER_AGE, FillRule::Median),
    (ORDER_QUANTITY, FillRule::Zero),
    (PROFIT, FillRule::Zero),
    (REVENUE, FillRule::Zero),
    (AGE_GROUP, FillRule::Text(UNKNOWN)),
    (CUSTOMER_GENDER, FillRule::Text(UNKNOWN)),
    (COUNTRY, FillRule::Text(UNKNOWN)),
    (STATE, FillRule::Text(UNKNOWN)),
];

/// Source → canonical column names.
pub const RENAME_MAP: [(&str, &str); 11] = [
    (CUSTOMER_AGE, "Customer_Age"),
    (AGE_GROUP, "Age_Group"),
    (CUSTOMER_GENDER, "Gender"),
    (PRODUCT_CATEGORY, "Category"),
    (SUB_CATEGORY, "Sub_Category"),
    (ORDER_QUANTITY, "Quantity"),
    ("Unit_Cost", "Unit_Cost"),
    ("Unit_Price", "Unit_Price"),
    (PROFIT, "Profit"),
    ("Cost", "Total_Cost"),
    (REVENUE, "Total_Revenue"),
];

/// Canonical name of a source column, if the rename table covers it.
pub fn canonical_name(column: &str) -> Option<&'static str> {
    RENAME_MAP
        .iter()
        .find(|(source, _)| *source == column)
        .map(|(_, target)| *target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rename_targets_are_unique() {
        let targets: HashSet<&str> = RENAME_MAP.iter().map(|(_, t)| *t).collect();
        assert_eq!(targets.len(), RENAME_MAP.len());
    }

    #[test]
    fn test_rename_sources_are_unique() {
        let sources: HashSet<&str> = RENAME_MAP.iter().map(|(s, _)| *s).collect();
        assert_eq!(sources.len(), RENAME_MAP.len());
    }

    #[test]
    fn test_fill_policy_columns_are_unique() {
        let columns: HashSet<&str> = FILL_POLICY.iter().map(|(c, _)| *c).collect();
        assert_eq!(columns.len(), FILL_POLICY.len());
        assert!(FILL_POLICY.contains(&(COUNTRY, FillRule::Text("Unknown"))));
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("Customer_Gender"), Some("Gender"));
        assert_eq!(canonical_name("Cost"), Some("Total_Cost"));
        assert_eq!(canonical_name("Revenue"), Some("Total_Revenue"));
        assert_eq!(canonical_name("Country"), None);
    }
}
