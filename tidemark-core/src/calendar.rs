//! Unit calendar — the discrete quantum of the ingestion timeline.
//!
//! Every domain endpoint is aligned to one `Unit`. The calendar owns the
//! arithmetic (`increment`/`decrement` move exactly one quantum) and the
//! string codec for endpoints; the sparsity map builds its adjacency and
//! merge rules on top of these.

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::DateInterval;
use crate::errors::DomainError;

/// Endpoint format shared by all units. Must never produce `/` or `|`,
/// which delimit the serialized sparsity map.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The discrete time unit of a processor's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Days,
    Months,
    Years,
}

impl Default for Unit {
    fn default() -> Self {
        Unit::Days
    }
}

impl Unit {
    /// Move one quantum forward. Month arithmetic clamps to month length
    /// (Jan-31 + 1 month = Feb-28/29); saturates at the calendar edge.
    pub fn increment(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Unit::Days => date.succ_opt().unwrap_or(NaiveDate::MAX),
            Unit::Months => date
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX),
            Unit::Years => date
                .checked_add_months(Months::new(12))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Move one quantum backward. Mirror of [`Unit::increment`].
    pub fn decrement(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Unit::Days => date.pred_opt().unwrap_or(NaiveDate::MIN),
            Unit::Months => date
                .checked_sub_months(Months::new(1))
                .unwrap_or(NaiveDate::MIN),
            Unit::Years => date
                .checked_sub_months(Months::new(12))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    /// Canonical endpoint rendering.
    pub fn format(&self, date: NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    /// Parse an endpoint as rendered by [`Unit::format`].
    pub fn parse_date(&self, input: &str) -> Result<NaiveDate, DomainError> {
        NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|e| DomainError::BadDate {
            input: input.to_string(),
            reason: e.to_string(),
        })
    }

    /// Closed-interval intersection test.
    pub fn intersects(&self, a: &DateInterval, b: &DateInterval) -> bool {
        a.start <= b.end && b.start <= a.end
    }

    /// Intersection or one-quantum adjacency. Adjacent closed intervals
    /// cover a contiguous span and must merge.
    pub fn intersects_or_adjacent(&self, a: &DateInterval, b: &DateInterval) -> bool {
        self.intersects(a, b)
            || self.increment(a.end) == b.start
            || self.increment(b.end) == a.start
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unit::Days => "days",
            Unit::Months => "months",
            Unit::Years => "years",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(Unit::Days),
            "months" => Ok(Unit::Months),
            "years" => Ok(Unit::Years),
            other => Err(DomainError::UnknownUnit {
                unit: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_increment_and_decrement_are_inverse() {
        let date = d(2021, 3, 14);
        assert_eq!(Unit::Days.increment(date), d(2021, 3, 15));
        assert_eq!(Unit::Days.decrement(d(2021, 3, 15)), date);
    }

    #[test]
    fn month_increment_clamps_to_month_length() {
        assert_eq!(Unit::Months.increment(d(2021, 1, 31)), d(2021, 2, 28));
        assert_eq!(Unit::Months.increment(d(2020, 1, 31)), d(2020, 2, 29));
        assert_eq!(Unit::Months.increment(d(2021, 12, 15)), d(2022, 1, 15));
    }

    #[test]
    fn year_increment_handles_leap_day() {
        assert_eq!(Unit::Years.increment(d(2020, 2, 29)), d(2021, 2, 28));
        assert_eq!(Unit::Years.decrement(d(2021, 2, 28)), d(2020, 2, 28));
    }

    #[test]
    fn format_parse_round_trip() {
        let date = d(2021, 1, 5);
        let text = Unit::Days.format(date);
        assert_eq!(text, "2021-01-05");
        assert_eq!(Unit::Days.parse_date(&text).unwrap(), date);
        assert!(Unit::Days.parse_date("01/05/2021").is_err());
    }

    #[test]
    fn adjacency_respects_unit() {
        let a = DateInterval::new(d(2021, 1, 1), d(2021, 1, 5)).unwrap();
        let b = DateInterval::new(d(2021, 1, 6), d(2021, 1, 9)).unwrap();
        assert!(!Unit::Days.intersects(&a, &b));
        assert!(Unit::Days.intersects_or_adjacent(&a, &b));
        assert!(!Unit::Months.intersects_or_adjacent(&a, &b));
    }

    #[test]
    fn unit_names_round_trip() {
        for unit in [Unit::Days, Unit::Months, Unit::Years] {
            assert_eq!(unit.to_string().parse::<Unit>().unwrap(), unit);
        }
        assert!("weeks".parse::<Unit>().is_err());
    }
}
