//! Date normalization for values written to the CRM.
//!
//! Date fields are stored locally as whatever the editor produced (usually a
//! full ISO timestamp). The API only accepts `YYYY-MM-DD` for `date` fields.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::errors::{Result, ValidationError};

pub const API_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format an ISO 8601 timestamp as an API date (`YYYY-MM-DD`).
///
/// The calendar date is taken in the timestamp's own offset. Values that are
/// already plain dates pass through unchanged.
pub fn format_iso_to_api_date(value: &str) -> Result<String> {
    let trimmed = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, API_DATE_FORMAT) {
        return Ok(date.format(API_DATE_FORMAT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive().format(API_DATE_FORMAT).to_string());
    }
    // Salesforce datetime style: 2020-07-01T10:00:00.000+0000
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.date_naive().format(API_DATE_FORMAT).to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date().format(API_DATE_FORMAT).to_string());
    }

    Err(ValidationError::InvalidDate(value.to_string()).into())
}

/// Current time as an ISO string, the form survey dates are stamped with.
pub fn now_iso_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
