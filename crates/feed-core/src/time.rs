//! Mainland market clock helpers.
//!
//! Providers report exchange-local times (UTC+8, no daylight saving). Records
//! carry UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

const UTC_PLUS_8_SECS: i32 = 8 * 3600;

/// Fixed UTC+8 offset used by both mainland exchanges.
#[must_use]
pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_PLUS_8_SECS).unwrap_or_else(|| Utc.fix())
}

/// Interprets an exchange-local wall-clock time as UTC.
#[must_use]
pub fn local_to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    market_offset()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The 15:00 close of a trading day, in UTC.
///
/// Daily and longer bars are stamped with the close of their last session.
#[must_use]
pub fn session_close(date: NaiveDate) -> Option<DateTime<Utc>> {
    let close = NaiveTime::from_hms_opt(15, 0, 0)?;
    local_to_utc(date.and_time(close))
}

/// Parses a compact `YYYYMMDD` date.
#[must_use]
pub fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d").ok()
}

/// Formats a date as compact `YYYYMMDD`.
#[must_use]
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Today's date on the exchange calendar.
#[must_use]
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&market_offset()).date_naive()
}
