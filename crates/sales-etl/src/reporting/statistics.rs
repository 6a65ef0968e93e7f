//! Descriptive statistics and preview of the final table.
//!
//! These are for human consumption only and never feed back into the
//! persisted output.

use crate::cleaner::dates::series_dates;
use crate::utils::{DtypeCategory, get_dtype_category};
use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

/// Summary statistics of one column.
///
/// Numeric columns fill the moment and quantile fields; text, boolean and
/// date columns fill `unique`/`top`/`freq`, and dates add `first`/`last`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column: String,
    pub dtype: String,
    /// Present values (NaN excluded for numeric columns).
    pub count: usize,
    pub missing: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p25: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p75: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Earliest date, for date columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    /// Latest date, for date columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

impl ColumnStatistics {
    fn empty(series: &Series) -> Self {
        Self {
            column: series.name().to_string(),
            dtype: format!("{}", series.dtype()),
            count: 0,
            missing: series.null_count(),
            unique: None,
            top: None,
            freq: None,
            mean: None,
            std: None,
            min: None,
            p25: None,
            median: None,
            p75: None,
            max: None,
            first: None,
            last: None,
        }
    }
}

/// Describe every column of `df`, in column order.
pub fn describe(df: &DataFrame) -> Result<Vec<ColumnStatistics>> {
    df.get_columns()
        .iter()
        .map(|column| describe_series(column.as_materialized_series()))
        .collect()
}

fn describe_series(series: &Series) -> Result<ColumnStatistics> {
    let mut stats = ColumnStatistics::empty(series);

    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => {
            let mut values: Vec<f64> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .flatten()
                .filter(|v| !v.is_nan())
                .collect();
            values.sort_by(f64::total_cmp);

            stats.count = values.len();
            if !values.is_empty() {
                stats.mean = Some(mean(&values));
                stats.std = sample_std(&values);
                stats.min = values.first().copied();
                stats.p25 = Some(quantile(&values, 0.25));
                stats.median = Some(quantile(&values, 0.5));
                stats.p75 = Some(quantile(&values, 0.75));
                stats.max = values.last().copied();
            }
        }
        DtypeCategory::Datetime => {
            let dates: Vec<_> = series_dates(&series.cast(&DataType::Date)?)?
                .into_iter()
                .flatten()
                .collect();
            let text: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
            categorical(&mut stats, text.iter().map(String::as_str));
            stats.first = dates.iter().min().map(|d| d.to_string());
            stats.last = dates.iter().max().map(|d| d.to_string());
        }
        _ => {
            let text = series.cast(&DataType::String)?;
            categorical(&mut stats, text.str()?.into_iter().flatten());
        }
    }

    Ok(stats)
}

/// Fill count/unique/top/freq. Ties for `top` go to the value seen first.
fn categorical<'a>(stats: &mut ColumnStatistics, values: impl Iterator<Item = &'a str>) {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut count = 0;
    for (idx, value) in values.enumerate() {
        counts.entry(value).or_insert((0, idx)).0 += 1;
        count += 1;
    }

    stats.count = count;
    stats.unique = Some(counts.len());
    if let Some((value, (freq, _))) = counts
        .iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
    {
        stats.top = Some(value.to_string());
        stats.freq = Some(*freq);
    }
}

fn mean(sorted: &[f64]) -> f64 {
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Sample standard deviation; undefined below two values.
fn sample_std(sorted: &[f64]) -> Option<f64> {
    if sorted.len() < 2 {
        return None;
    }
    let m = mean(sorted);
    let variance =
        sorted.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (sorted.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Linearly interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// First `rows` rows rendered as a table.
pub fn preview(df: &DataFrame, rows: usize) -> String {
    format!("{}", df.head(Some(rows)))
}

/// Render statistics as a fixed-width console table, one row per column.
pub fn render_statistics(stats: &[ColumnStatistics]) -> String {
    const HEADERS: [&str; 13] = [
        "column", "count", "missing", "unique", "top", "freq", "mean", "std", "min", "25%", "50%",
        "75%", "max",
    ];

    let rows: Vec<[String; 13]> = stats
        .iter()
        .map(|s| {
            let (min, max) = match (&s.first, &s.last) {
                (Some(first), Some(last)) => (first.clone(), last.clone()),
                _ => (fmt_num(s.min), fmt_num(s.max)),
            };
            [
                s.column.clone(),
                s.count.to_string(),
                s.missing.to_string(),
                s.unique.map(|u| u.to_string()).unwrap_or_default(),
                s.top.clone().map(|t| truncate(&t, 20)).unwrap_or_default(),
                s.freq.map(|f| f.to_string()).unwrap_or_default(),
                fmt_num(s.mean),
                fmt_num(s.std),
                min,
                fmt_num(s.p25),
                fmt_num(s.median),
                fmt_num(s.p75),
                max,
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(idx, (cell, w))| {
                if idx == 0 || idx == 4 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    out
}

fn fmt_num(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max - 1).collect();
        t.push('…');
        t
    }
}
