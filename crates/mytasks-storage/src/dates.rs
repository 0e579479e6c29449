//! Stored date and timestamp text.
//!
//! Dates are written as `YYYY-MM-DD` and timestamps as RFC 3339. Older rows
//! hold whatever their writer produced, so reads accept every layout below.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{DbError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Layouts without an offset, tried after plain dates and RFC 3339.
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Layouts with a numeric offset that RFC 3339 parsing does not cover.
const ZONED_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

enum Stored {
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

fn parse_stored(value: &str) -> Option<Stored> {
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        return Some(Stored::Date(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(Stored::Zoned(dt));
    }
    for layout in ZONED_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(value, layout) {
            return Some(Stored::Zoned(dt));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(Stored::Naive(dt));
        }
    }
    None
}

/// Canonical text for a calendar date.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Canonical text for a timestamp.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored date column. Blank text reads as no date.
///
/// Datetime encodings keep the calendar day as written, in the offset they
/// were written with.
pub fn parse_stored_date(value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    match parse_stored(value) {
        Some(Stored::Date(date)) => Ok(Some(date)),
        Some(Stored::Naive(dt)) => Ok(Some(dt.date())),
        Some(Stored::Zoned(dt)) => Ok(Some(dt.date_naive())),
        None => Err(DbError::InvalidDate(value.to_string())),
    }
}

/// Parses a stored timestamp column. Values without an offset are UTC.
pub fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    match parse_stored(value) {
        Some(Stored::Date(date)) => Ok(date.and_time(chrono::NaiveTime::default()).and_utc()),
        Some(Stored::Naive(dt)) => Ok(dt.and_utc()),
        Some(Stored::Zoned(dt)) => Ok(dt.with_timezone(&Utc)),
        None => Err(DbError::InvalidDate(value.to_string())),
    }
}

pub(crate) fn opt_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    match value {
        Some(text) => parse_stored_date(&text),
        None => Ok(None),
    }
}
