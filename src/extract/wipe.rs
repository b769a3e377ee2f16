//! Wipe-time normalization
//!
//! Wipe instants are reduced to a weekday name and an hour token in US
//! Eastern time, e.g. ("Thursday", "1pm est").

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;

/// Formats an instant as an Eastern hour token: `<1-12><am|pm> est`
pub fn format_wipe_hour<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    let eastern = instant.with_timezone(&New_York);
    let hour = eastern.format("%I%p").to_string();
    format!(
        "{} est",
        hour.trim_start_matches('0').to_ascii_lowercase()
    )
}

/// Full English weekday name of the instant in its own offset
pub fn day_name<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    weekday_name(instant.weekday()).to_string()
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses a source timestamp (RFC 3339, `Z` or numeric offset)
///
/// Returns `None` for anything else so the caller can fall back to the
/// extraction time.
pub fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok()
}

/// Resolves the wipe instant for a listing, defaulting to the extraction time
pub fn instant_or(raw: Option<&str>, observed_at: DateTime<Utc>) -> DateTime<FixedOffset> {
    raw.and_then(parse_instant)
        .unwrap_or_else(|| observed_at.fixed_offset())
}
