//! # IST Date Handling
//!
//! The business runs on India Standard Time (UTC+05:30). Storage and query
//! bounds are UTC; every calendar decision (which day, which month, which
//! fiscal year) is made on the IST calendar.
//!
//! ## Query Bounds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "2025-07-21" as a lower bound                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2025-07-21T00:00:00+05:30   (IST midnight)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2025-07-20T18:30:00.000Z    (same instant in UTC)                      │
//! │                                                                         │
//! │  "2025-07-21" as an upper bound → 2025-07-21T18:29:59.000Z              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Timestamps
//! Documents written by different tools over the years carry timestamps in
//! several shapes. [`parse_timestamp`] accepts all of them:
//! - RFC 3339 (`2025-07-21T10:00:00Z`, `...+05:30`)
//! - `+0000` style offsets (`2025-07-21T10:00:00+0000`)
//! - zone-less timestamps, read as UTC (`2025-07-21T10:00:00`)
//! - date-only values, pinned to noon IST (`2025-07-21` → `06:30:00Z`) so
//!   the IST calendar date never shifts

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    SecondsFormat, TimeZone, Utc,
};

use crate::error::{CoreError, CoreResult};

/// IST offset from UTC in seconds (+05:30).
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Returns the IST fixed offset.
pub fn ist() -> FixedOffset {
    // 19800 seconds is always within the valid offset range
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Which end of a date range a date-only value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// 00:00:00 IST
    Start,
    /// 23:59:59 IST
    End,
}

// =============================================================================
// Query Bounds
// =============================================================================

/// Resolves a user-supplied date or timestamp to a UTC query bound.
///
/// Date-only input is interpreted on the IST calendar. Full timestamps are
/// taken as they are.
pub fn query_bound(value: &str, bound: Bound) -> CoreResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::from_hms_opt(0, 0, 0),
            Bound::End => NaiveTime::from_hms_opt(23, 59, 59),
        }
        .ok_or_else(|| CoreError::InvalidDate(value.to_string()))?;
        return ist_to_utc(date.and_time(time)).ok_or_else(|| CoreError::InvalidDate(value.to_string()));
    }

    parse_timestamp(value).ok_or_else(|| CoreError::InvalidDate(value.to_string()))
}

/// Formats a query bound as an ISO string with millisecond precision.
///
/// ## Example
/// ```rust
/// use salesdesk_core::dates::{format_date_for_query, Bound};
///
/// assert_eq!(
///     format_date_for_query("2025-07-21", Bound::Start).unwrap(),
///     "2025-07-20T18:30:00.000Z"
/// );
/// assert_eq!(
///     format_date_for_query("2025-07-21", Bound::End).unwrap(),
///     "2025-07-21T18:29:59.000Z"
/// );
/// assert_eq!(
///     format_date_for_query("2025-07-21T10:00:00Z", Bound::Start).unwrap(),
///     "2025-07-21T10:00:00.000Z"
/// );
/// ```
pub fn format_date_for_query(value: &str, bound: Bound) -> CoreResult<String> {
    query_bound(value, bound).map(|dt| to_iso_millis(&dt))
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// Parses a stored timestamp in any of the accepted shapes.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // "+0000" style offsets
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // No zone: read as UTC
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    // Date only: noon IST keeps the IST calendar date stable
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let noon = date.and_hms_opt(6, 30, 0)?;
        return Some(Utc.from_utc_datetime(&noon));
    }

    None
}

/// Parses a date typed into a spreadsheet: anything [`parse_timestamp`]
/// accepts, plus day-first `DD/MM/YYYY` or `DD/MM/YY` (noon IST).
pub fn parse_sheet_date(value: &str) -> Option<DateTime<Utc>> {
    if let Some(dt) = parse_timestamp(value) {
        return Some(dt);
    }
    let value = value.trim();
    // %Y would read "25" as year 25
    let short_year = value.rsplit(['/', '-']).next().map(str::len) == Some(2);
    let formats: &[&str] = if short_year {
        &["%d/%m/%y", "%d-%m-%y"]
    } else {
        &["%d/%m/%Y", "%d-%m-%Y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .and_then(|date| date.and_hms_opt(6, 30, 0))
        .map(|noon| Utc.from_utc_datetime(&noon))
}

/// Like [`parse_timestamp`], falling back to `now` for unparseable input.
pub fn normalize_timestamp(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_timestamp(value).unwrap_or(now)
}

/// Formats a UTC timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn to_iso_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// IST Calendar
// =============================================================================

/// Converts an IST wall-clock time to UTC.
pub fn ist_to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    ist()
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Returns the IST calendar date of a timestamp.
pub fn ist_date(dt: &DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(&ist()).date_naive()
}

/// Returns the IST calendar date of a timestamp as `YYYY-MM-DD`.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use salesdesk_core::dates::ist_date_string;
///
/// // 20:00 UTC is already the next day in India
/// let late = Utc.with_ymd_and_hms(2025, 7, 20, 20, 0, 0).unwrap();
/// assert_eq!(ist_date_string(&late), "2025-07-21");
/// ```
pub fn ist_date_string(dt: &DateTime<Utc>) -> String {
    ist_date(dt).format("%Y-%m-%d").to_string()
}

/// Checks whether a timestamp falls on the given IST date (`YYYY-MM-DD`).
pub fn is_on_ist_date(dt: &DateTime<Utc>, date: &str) -> bool {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| ist_date(dt) == d)
        .unwrap_or(false)
}

/// Returns the UTC instant of 00:00 IST on the IST day containing `dt`.
pub fn start_of_ist_day(dt: &DateTime<Utc>) -> DateTime<Utc> {
    ist_midnight(ist_date(dt)).unwrap_or(*dt)
}

/// Returns the UTC instant of 00:00 IST on `date`.
pub fn ist_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    ist_to_utc(date.and_hms_opt(0, 0, 0)?)
}

/// Returns the first day of the IST month containing `dt`, shifted by
/// `months_back` months.
pub fn ist_month_start(dt: &DateTime<Utc>, months_back: u32) -> Option<NaiveDate> {
    let today = ist_date(dt);
    let total = today.year() * 12 + today.month0() as i32 - months_back as i32;
    NaiveDate::from_ymd_opt(total.div_euclid(12), total.rem_euclid(12) as u32 + 1, 1)
}

/// Formats a timestamp for people in India, e.g. `16/10/2026, 3:04:05 pm`.
pub fn format_ist_display(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&ist())
        .format("%d/%m/%Y, %-I:%M:%S %P")
        .to_string()
}

/// Formats a duration as `"Xh Ym"`, `"Ym"`, or `"Due now"` when it is not
/// positive.
///
/// ## Example
/// ```rust
/// use chrono::Duration;
/// use salesdesk_core::dates::format_time_until;
///
/// assert_eq!(format_time_until(Duration::minutes(95)), "1h 35m");
/// assert_eq!(format_time_until(Duration::minutes(42)), "42m");
/// assert_eq!(format_time_until(Duration::minutes(-5)), "Due now");
/// ```
pub fn format_time_until(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "Due now".to_string();
    }
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sheet_date_reads_day_first() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 5, 6, 30, 0).unwrap();
        assert_eq!(parse_sheet_date("05/07/2025"), Some(expected));
        assert_eq!(parse_sheet_date("05/07/25"), Some(expected));
        assert_eq!(parse_sheet_date("2025-07-05"), Some(expected));
        assert_eq!(parse_sheet_date("next week"), None);
    }

    #[test]
    fn test_date_only_lower_bound_is_ist_midnight() {
        assert_eq!(
            format_date_for_query("2025-07-21", Bound::Start).unwrap(),
            "2025-07-20T18:30:00.000Z"
        );
    }

    #[test]
    fn test_date_only_upper_bound_is_end_of_ist_day() {
        assert_eq!(
            format_date_for_query("2025-07-21", Bound::End).unwrap(),
            "2025-07-21T18:29:59.000Z"
        );
    }

    #[test]
    fn test_full_timestamp_passes_through() {
        assert_eq!(
            format_date_for_query("2025-07-21T05:00:00+05:30", Bound::End).unwrap(),
            "2025-07-20T23:30:00.000Z"
        );
        assert!(format_date_for_query("not a date", Bound::Start).is_err());
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 7, 21, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-07-21T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-21T10:00:00+0000"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-21T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-07-21T10:00:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("21st July"), None);
    }

    #[test]
    fn test_date_only_timestamp_is_noon_ist() {
        let dt = parse_timestamp("2025-07-21").unwrap();
        assert_eq!(to_iso_millis(&dt), "2025-07-21T06:30:00.000Z");
        assert_eq!(ist_date_string(&dt), "2025-07-21");
    }

    #[test]
    fn test_normalize_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(normalize_timestamp("garbage", now), now);
    }

    #[test]
    fn test_is_on_ist_date() {
        let dt = Utc.with_ymd_and_hms(2025, 7, 20, 19, 0, 0).unwrap();
        assert!(is_on_ist_date(&dt, "2025-07-21"));
        assert!(!is_on_ist_date(&dt, "2025-07-20"));
    }

    #[test]
    fn test_start_of_ist_day() {
        let dt = Utc.with_ymd_and_hms(2025, 7, 21, 12, 0, 0).unwrap();
        let start = start_of_ist_day(&dt);
        assert_eq!(to_iso_millis(&start), "2025-07-20T18:30:00.000Z");
    }

    #[test]
    fn test_month_start_crosses_year() {
        let dt = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        assert_eq!(
            ist_month_start(&dt, 0),
            NaiveDate::from_ymd_opt(2026, 2, 1)
        );
        assert_eq!(
            ist_month_start(&dt, 2),
            NaiveDate::from_ymd_opt(2025, 12, 1)
        );
    }

    #[test]
    fn test_format_ist_display() {
        let dt = Utc.with_ymd_and_hms(2026, 10, 16, 9, 34, 5).unwrap();
        assert_eq!(format_ist_display(&dt), "16/10/2026, 3:04:05 pm");
    }
}
