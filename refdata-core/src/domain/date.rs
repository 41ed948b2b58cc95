//! Trading dates, intraday times and snapshot stepping.
//!
//! Dates are carried in the integer `YYYYMMDD` form the upstream service
//! speaks, which keeps ordering a plain integer comparison. Calendar
//! arithmetic goes through `chrono`.

use crate::error::{RefDataError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar date in `YYYYMMDD` integer form.
///
/// [`TradingDate::OPEN_END`] is the far-future sentinel used for open-ended
/// intervals; it compares greater than every real date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingDate(i32);

impl TradingDate {
    /// Open-ended interval end. Treated as +infinity.
    pub const OPEN_END: TradingDate = TradingDate(99_999_999);

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::from_naive)
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32)
    }

    /// Validate an 8-digit integer date. The open-end sentinel is accepted.
    pub fn from_int(value: i64) -> Result<Self> {
        if value == Self::OPEN_END.0 as i64 {
            return Ok(Self::OPEN_END);
        }
        if !(10_000_101..=99_991_231).contains(&value) {
            return Err(RefDataError::InvalidDate(value.to_string()));
        }
        let v = value as i32;
        Self::from_ymd(v / 10_000, (v / 100 % 100) as u32, (v % 100) as u32)
            .ok_or_else(|| RefDataError::InvalidDate(value.to_string()))
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }

    pub fn is_open_end(self) -> bool {
        self == Self::OPEN_END
    }

    /// Convert to a chrono date. `None` for the open-end sentinel.
    pub fn to_naive(self) -> Option<NaiveDate> {
        if self.is_open_end() {
            return None;
        }
        NaiveDate::from_ymd_opt(self.0 / 10_000, (self.0 / 100 % 100) as u32, (self.0 % 100) as u32)
    }

    /// ISO `YYYY-MM-DD` rendering, used in log lines and CSV export.
    pub fn to_iso(self) -> String {
        match self.to_naive() {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for TradingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

impl FromStr for TradingDate {
    type Err = RefDataError;

    /// Accepts `YYYYMMDD` or ISO `YYYY-MM-DD`; both normalize to the same value.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
            let value: i64 = s.parse().map_err(|_| RefDataError::InvalidDate(s.to_string()))?;
            return Self::from_int(value);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self::from_naive)
            .map_err(|_| RefDataError::InvalidDate(s.to_string()))
    }
}

impl From<NaiveDate> for TradingDate {
    fn from(date: NaiveDate) -> Self {
        Self::from_naive(date)
    }
}

/// Intraday time in `HHMMSS` integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeTime(u32);

impl TradeTime {
    /// Default bar/tick window start: the night session open of the previous day.
    pub const SESSION_START: TradeTime = TradeTime(200_000);
    /// Default bar/tick window end: the day session close.
    pub const SESSION_END: TradeTime = TradeTime(160_000);

    pub fn from_int(value: u32) -> Result<Self> {
        let (h, m, s) = (value / 10_000, value / 100 % 100, value % 100);
        if h > 23 || m > 59 || s > 59 {
            return Err(RefDataError::InvalidArgument(format!(
                "invalid time {value}: expected HHMMSS"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TradeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TradeTime {
    type Err = RefDataError;

    /// Accepts `HHMMSS` or `HH:MM:SS`.
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.trim().chars().filter(|c| *c != ':').collect();
        let bad = || RefDataError::InvalidArgument(format!("invalid time '{s}': expected HHMMSS or HH:MM:SS"));
        if digits.is_empty() || digits.len() > 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        if s.contains(':') && digits.len() != 6 {
            return Err(bad());
        }
        Self::from_int(digits.parse().map_err(|_| bad())?)
    }
}

/// How far apart periodic snapshots (e.g. index weights) are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPeriod {
    /// Next business day.
    Day,
    /// Next Monday.
    Week,
    /// First business day of the next month.
    #[default]
    Month,
}

impl SnapshotPeriod {
    /// The first period boundary strictly after `date`.
    pub fn next_boundary(self, date: NaiveDate) -> NaiveDate {
        match self {
            SnapshotPeriod::Day => next_weekday(date + Duration::days(1)),
            SnapshotPeriod::Week => {
                let days_to_monday = 7 - date.weekday().num_days_from_monday() as i64;
                date + Duration::days(days_to_monday)
            }
            SnapshotPeriod::Month => {
                let this_month = first_weekday_of_month(date.year(), date.month());
                if this_month > date {
                    this_month
                } else {
                    let (y, m) = next_month(date.year(), date.month());
                    first_weekday_of_month(y, m)
                }
            }
        }
    }

    /// The latest period boundary on or before `date`.
    pub fn boundary_on_or_before(self, date: NaiveDate) -> NaiveDate {
        match self {
            SnapshotPeriod::Day => {
                let mut d = date;
                while is_weekend(d) {
                    d -= Duration::days(1);
                }
                d
            }
            SnapshotPeriod::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            SnapshotPeriod::Month => {
                let this_month = first_weekday_of_month(date.year(), date.month());
                if this_month <= date {
                    this_month
                } else {
                    let (y, m) = prev_month(date.year(), date.month());
                    first_weekday_of_month(y, m)
                }
            }
        }
    }
}

impl FromStr for SnapshotPeriod {
    type Err = RefDataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(SnapshotPeriod::Day),
            "week" => Ok(SnapshotPeriod::Week),
            "month" => Ok(SnapshotPeriod::Month),
            other => Err(RefDataError::InvalidArgument(format!(
                "unknown snapshot period '{other}': expected day, week or month"
            ))),
        }
    }
}

pub(crate) fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    while is_weekend(date) {
        date += Duration::days(1);
    }
    date
}

fn first_weekday_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 exists for every month chrono can represent here.
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    next_weekday(first)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn integer_and_iso_forms_normalize_to_same_date() {
        let a: TradingDate = "20200103".parse().unwrap();
        let b: TradingDate = "2020-01-03".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_i32(), 20200103);
        assert_eq!(a.to_string(), "20200103");
        assert_eq!(a.to_iso(), "2020-01-03");
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(TradingDate::from_int(20201340).is_err());
        assert!(TradingDate::from_int(2020).is_err());
        assert!("2020/01/03".parse::<TradingDate>().is_err());
        assert!("".parse::<TradingDate>().is_err());
    }

    #[test]
    fn open_end_sorts_after_real_dates() {
        let real = TradingDate::from_int(99991231).unwrap();
        assert!(TradingDate::OPEN_END > real);
        assert!(TradingDate::from_int(99_999_999).unwrap().is_open_end());
        assert_eq!(TradingDate::OPEN_END.to_naive(), None);
    }

    #[test]
    fn trade_time_accepts_both_forms() {
        assert_eq!("09:56:00".parse::<TradeTime>().unwrap().as_u32(), 95600);
        assert_eq!("135600".parse::<TradeTime>().unwrap().as_u32(), 135600);
        assert!("25:00:00".parse::<TradeTime>().is_err());
        assert!("9:5".parse::<TradeTime>().is_err());
    }

    #[test]
    fn month_boundary_is_first_business_day_of_next_month() {
        // 2020-02-01 is a Saturday, so February's first business day is the 3rd.
        assert_eq!(SnapshotPeriod::Month.next_boundary(d(2020, 1, 2)), d(2020, 2, 3));
        assert_eq!(SnapshotPeriod::Month.next_boundary(d(2020, 2, 1)), d(2020, 2, 3));
        assert_eq!(SnapshotPeriod::Month.next_boundary(d(2020, 12, 15)), d(2021, 1, 1));
    }

    #[test]
    fn month_boundary_on_or_before() {
        assert_eq!(SnapshotPeriod::Month.boundary_on_or_before(d(2020, 2, 17)), d(2020, 2, 3));
        // Before February's first business day, fall back to January's.
        assert_eq!(SnapshotPeriod::Month.boundary_on_or_before(d(2020, 2, 1)), d(2020, 1, 1));
    }

    #[test]
    fn week_and_day_boundaries() {
        // 2020-01-08 is a Wednesday.
        assert_eq!(SnapshotPeriod::Week.next_boundary(d(2020, 1, 8)), d(2020, 1, 13));
        assert_eq!(SnapshotPeriod::Week.boundary_on_or_before(d(2020, 1, 8)), d(2020, 1, 6));
        // Friday steps over the weekend.
        assert_eq!(SnapshotPeriod::Day.next_boundary(d(2020, 1, 10)), d(2020, 1, 13));
    }
}
