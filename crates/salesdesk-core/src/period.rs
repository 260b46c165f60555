//! # Reporting Periods
//!
//! Fixed windows the stats snapshot is bucketed into. All boundaries are
//! computed on the IST calendar.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┬───────────────────────┐
//! │ Period           │ Start (IST)                  │ End                   │
//! ├──────────────────┼──────────────────────────────┼───────────────────────┤
//! │ lifetime         │ (none)                       │ (none)                │
//! │ current_fy       │ 1 April of the fiscal year   │ now                   │
//! │ current_month    │ 1st of this month, 00:00     │ now                   │
//! │ last_month       │ 1st of last month, 00:00     │ last day, 23:59:59.999│
//! │ last_N_months    │ 1st of the month N-1 back    │ now                   │
//! └──────────────────┴──────────────────────────────┴───────────────────────┘
//! ```
//!
//! The fiscal year starts on 1 April: in January 2026 the current fiscal
//! year began on 1 April 2025.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dates::{ist_date, ist_midnight, ist_month_start};
use crate::error::CoreError;

/// A reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Lifetime,
    CurrentFy,
    CurrentMonth,
    LastMonth,
    /// The current month plus the `n - 1` months before it.
    LastMonths(u32),
}

impl Period {
    /// Periods stored in every stats snapshot, in display order.
    pub const SNAPSHOT: [Period; 5] = [
        Period::Lifetime,
        Period::CurrentFy,
        Period::CurrentMonth,
        Period::LastMonth,
        Period::LastMonths(3),
    ];

    /// Stable key used in JSON payloads and query strings.
    pub fn key(&self) -> String {
        match self {
            Period::Lifetime => "lifetime".to_string(),
            Period::CurrentFy => "current_fy".to_string(),
            Period::CurrentMonth => "current_month".to_string(),
            Period::LastMonth => "last_month".to_string(),
            Period::LastMonths(n) => format!("last_{}_months", n),
        }
    }

    /// Resolves the period to a concrete range relative to `now`.
    ///
    /// Returns `None` for [`Period::Lifetime`], which has no bounds.
    pub fn range(&self, now: DateTime<Utc>) -> Option<DateRange> {
        let today = ist_date(&now);
        match self {
            Period::Lifetime => None,
            Period::CurrentFy => {
                let fy_year = if today.month() >= 4 {
                    today.year()
                } else {
                    today.year() - 1
                };
                let start = NaiveDate::from_ymd_opt(fy_year, 4, 1).and_then(ist_midnight)?;
                Some(DateRange::new(start, now))
            }
            Period::CurrentMonth => {
                let start = ist_month_start(&now, 0).and_then(ist_midnight)?;
                Some(DateRange::new(start, now))
            }
            Period::LastMonth => {
                let start = ist_month_start(&now, 1).and_then(ist_midnight)?;
                let this_month = ist_month_start(&now, 0).and_then(ist_midnight)?;
                Some(DateRange::new(start, this_month - Duration::milliseconds(1)))
            }
            Period::LastMonths(n) => {
                let back = n.saturating_sub(1);
                let start = ist_month_start(&now, back).and_then(ist_midnight)?;
                Some(DateRange::new(start, now))
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Period {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "lifetime" | "all" => Ok(Period::Lifetime),
            "current_fy" | "fy" => Ok(Period::CurrentFy),
            "current_month" | "month" => Ok(Period::CurrentMonth),
            "last_month" => Ok(Period::LastMonth),
            other => other
                .strip_prefix("last_")
                .and_then(|rest| rest.strip_suffix("_months"))
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .map(Period::LastMonths)
                .ok_or_else(|| CoreError::unknown("period", other)),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.key()
    }
}

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive UTC range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange { start, end }
    }

    /// `start <= at <= end`
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at <= self.end
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::to_iso_millis;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_lifetime_has_no_range() {
        assert!(Period::Lifetime.range(Utc::now()).is_none());
    }

    #[test]
    fn test_fiscal_year_before_april() {
        let now = at(2026, 1, 15, 12);
        let range = Period::CurrentFy.range(now).unwrap();
        assert_eq!(to_iso_millis(&range.start), "2025-03-31T18:30:00.000Z");
        assert_eq!(range.end, now);
    }

    #[test]
    fn test_fiscal_year_from_april() {
        let now = at(2025, 4, 2, 12);
        let range = Period::CurrentFy.range(now).unwrap();
        assert_eq!(to_iso_millis(&range.start), "2025-03-31T18:30:00.000Z");
    }

    #[test]
    fn test_last_month_covers_whole_previous_month() {
        let now = at(2025, 3, 10, 12);
        let range = Period::LastMonth.range(now).unwrap();
        assert_eq!(to_iso_millis(&range.start), "2025-01-31T18:30:00.000Z");
        assert_eq!(to_iso_millis(&range.end), "2025-02-28T18:29:59.999Z");

        // An event on the last evening of February (IST) is included
        assert!(range.contains(&at(2025, 2, 28, 15)));
        assert!(!range.contains(&at(2025, 2, 28, 19)));
    }

    #[test]
    fn test_current_month_uses_ist_calendar() {
        // 20:00 UTC on 31 March is already 1 April in India
        let now = at(2025, 3, 31, 20);
        let range = Period::CurrentMonth.range(now).unwrap();
        assert_eq!(to_iso_millis(&range.start), "2025-03-31T18:30:00.000Z");
    }

    #[test]
    fn test_last_three_months() {
        let now = at(2025, 3, 10, 12);
        let range = Period::LastMonths(3).range(now).unwrap();
        assert_eq!(to_iso_millis(&range.start), "2024-12-31T18:30:00.000Z");
    }

    #[test]
    fn test_period_keys_roundtrip() {
        for period in Period::SNAPSHOT {
            assert_eq!(period.key().parse::<Period>().unwrap(), period);
        }
        assert!("last_0_months".parse::<Period>().is_err());
        assert!("yesterday".parse::<Period>().is_err());
    }
}
