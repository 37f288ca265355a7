//! Date parsing and normalization
//!
//! Every date in the system is canonically UTC midnight. Client payloads
//! may carry RFC 3339 timestamps or plain `YYYY-MM-DD` days; both collapse
//! to the same canonical instant through [`normalize`], so equality checks
//! against the schedule never depend on the time of day or an offset.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::types::{Result, RitualError};

/// Parse a client-supplied date string. The instant is converted to UTC
/// but not yet snapped to midnight.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)));
    }
    Err(RitualError::InvalidDateFormat(input.to_string()))
}

/// Snap a datetime to UTC midnight of its day.
pub fn normalize(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.date_naive().and_time(NaiveTime::MIN))
}

/// Parse and normalize in one step.
pub fn parse_day(input: &str) -> Result<DateTime<Utc>> {
    Ok(normalize(parse_date(input)?))
}

/// Today at UTC midnight.
pub fn today() -> DateTime<Utc> {
    normalize(Utc::now())
}
