//! Lenient calendar-date parsing.
//!
//! Parsing never fails the run: anything that does not match one of the
//! accepted layouts becomes a missing value.

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y-%m",
    "%d-%b-%Y",
];

/// Parse a text cell into a calendar date, dropping any time of day.
pub fn parse_lenient(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in DATE_FORMATS {
        if fmt == "%Y-%m" {
            // chrono needs a day to build a date
            if let Ok(d) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
                return Some(d);
            }
            continue;
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    None
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
#[inline]
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Inverse of [`days_since_epoch`].
#[inline]
pub fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Build a polars `Date` series from optional calendar dates.
pub fn date_series(name: PlSmallStr, dates: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(days_since_epoch)).collect();
    Series::new(name, days).cast(&DataType::Date)
}

/// Calendar dates of a `Date`-typed series.
pub fn series_dates(series: &Series) -> PolarsResult<Vec<Option<NaiveDate>>> {
    let days = series.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(date_from_days))
        .collect())
}

/// Normalize any series into a `Date` series.
///
/// Returns the normalized series and the number of present cells that could
/// not be parsed (and are now missing).
pub fn normalize_date_series(series: &Series) -> Result<(Series, usize)> {
    let name = series.name().clone();

    match series.dtype() {
        DataType::Date => Ok((series.clone(), 0)),
        DataType::Datetime(_, _) => Ok((series.cast(&DataType::Date)?, 0)),
        _ => {
            let text = series.cast(&DataType::String)?;
            let mut unparsed = 0;
            let dates: Vec<Option<NaiveDate>> = text
                .str()?
                .into_iter()
                .map(|cell| match cell {
                    Some(raw) if !raw.trim().is_empty() => {
                        let parsed = parse_lenient(raw);
                        if parsed.is_none() {
                            unparsed += 1;
                        }
                        parsed
                    }
                    _ => None,
                })
                .collect();

            Ok((date_series(name, &dates)?, unparsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_lenient_iso() {
        assert_eq!(parse_lenient("2023-07-15"), Some(ymd(2023, 7, 15)));
        assert_eq!(parse_lenient(" 2023-07-15 10:30:00 "), Some(ymd(2023, 7, 15)));
        assert_eq!(parse_lenient("2023-07-15T10:30:00"), Some(ymd(2023, 7, 15)));
        assert_eq!(
            parse_lenient("2023-07-15T10:30:00+02:00"),
            Some(ymd(2023, 7, 15))
        );
    }

    #[test]
    fn test_parse_lenient_other_layouts() {
        assert_eq!(parse_lenient("2016/11/26"), Some(ymd(2016, 11, 26)));
        assert_eq!(parse_lenient("11/26/2016"), Some(ymd(2016, 11, 26)));
        assert_eq!(parse_lenient("26.11.2016"), Some(ymd(2016, 11, 26)));
        assert_eq!(parse_lenient("20161126"), Some(ymd(2016, 11, 26)));
        assert_eq!(parse_lenient("November 26, 2016"), Some(ymd(2016, 11, 26)));
        assert_eq!(parse_lenient("26 Nov 2016"), Some(ymd(2016, 11, 26)));
    }

    #[test]
    fn test_parse_lenient_rejects_garbage() {
        assert_eq!(parse_lenient("not a date"), None);
        assert_eq!(parse_lenient(""), None);
        assert_eq!(parse_lenient("2023-13-45"), None);
    }

    #[test]
    fn test_epoch_days_round_trip() {
        assert_eq!(days_since_epoch(ymd(1970, 1, 1)), 0);
        assert_eq!(days_since_epoch(ymd(1970, 1, 2)), 1);
        assert_eq!(date_from_days(19_553), Some(ymd(2023, 7, 15)));
    }

    #[test]
    fn test_normalize_text_series() {
        let series = Series::new(
            "Date".into(),
            &[Some("2023-07-15"), Some("garbage"), None, Some("  ")],
        );
        let (normalized, unparsed) = normalize_date_series(&series).unwrap();

        assert_eq!(normalized.dtype(), &DataType::Date);
        assert_eq!(unparsed, 1);
        assert_eq!(normalized.null_count(), 3);
        assert_eq!(
            series_dates(&normalized).unwrap()[0],
            Some(ymd(2023, 7, 15))
        );
    }
}
