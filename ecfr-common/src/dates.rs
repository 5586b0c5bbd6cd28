//! Issue date helpers
//!
//! The source API addresses every point-in-time snapshot by its issue date
//! (`YYYY-MM-DD`). Historical sweeps walk those dates at one-year intervals.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};

/// Wire format for issue dates
pub const ISSUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` issue date
pub fn parse_issue_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), ISSUE_DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(value.to_string()))
}

/// Format an issue date for URLs and storage
pub fn format_issue_date(date: NaiveDate) -> String {
    date.format(ISSUE_DATE_FORMAT).to_string()
}

/// Dates at one-year intervals from `start` through `end` inclusive
///
/// A February 29 start falls back to February 28 in non-leap years.
/// Returns an empty list when `start` is after `end`.
pub fn annual_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut year = start.year();

    loop {
        let current = start
            .with_year(year)
            .or_else(|| NaiveDate::from_ymd_opt(year, start.month(), 28));
        match current {
            Some(date) if date <= end => dates.push(date),
            _ => break,
        }
        year += 1;
    }

    dates
}
