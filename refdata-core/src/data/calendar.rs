//! Trading calendar providers.
//!
//! A [`CalendarProvider`] answers one question: which trading dates fall in
//! `[start, end]`, inclusive of both ends, in ascending order.

use crate::domain::date::is_weekend;
use crate::domain::TradingDate;
use crate::error::{RefDataError, Result};
use chrono::Duration;
use std::collections::BTreeSet;
use std::path::Path;

/// Trait for trading-date range providers.
pub trait CalendarProvider: Send + Sync {
    /// Trading dates in `[start, end]`, ascending. Empty when none exist.
    fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>>;
}

impl<C: CalendarProvider + ?Sized> CalendarProvider for &C {
    fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>> {
        (**self).trading_dates(start, end)
    }
}

impl<C: CalendarProvider + ?Sized> CalendarProvider for Box<C> {
    fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>> {
        (**self).trading_dates(start, end)
    }
}

/// Calendar backed by an explicit list of trading dates.
#[derive(Debug, Clone, Default)]
pub struct StaticCalendar {
    dates: Vec<TradingDate>,
}

impl StaticCalendar {
    /// Build from any date list; duplicates are removed and the result sorted.
    pub fn new(dates: impl IntoIterator<Item = TradingDate>) -> Self {
        let set: BTreeSet<TradingDate> = dates.into_iter().collect();
        Self {
            dates: set.into_iter().collect(),
        }
    }

    /// Load a calendar file: a CSV whose first column (header `trade_date`)
    /// holds one date per row in `YYYYMMDD` or ISO form.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| RefDataError::Calendar(format!("open {}: {e}", path.display())))?;
        let mut dates = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| RefDataError::Calendar(format!("row {}: {e}", i + 1)))?;
            let cell = record.get(0).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let date: TradingDate = cell
                .parse()
                .map_err(|e| RefDataError::Calendar(format!("row {}: {e}", i + 1)))?;
            dates.push(date);
        }
        Ok(Self::new(dates))
    }

    pub fn dates(&self) -> &[TradingDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl CalendarProvider for StaticCalendar {
    fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>> {
        if start > end {
            return Ok(Vec::new());
        }
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        Ok(self.dates[lo..hi].to_vec())
    }
}

/// Monday–Friday calendar minus an explicit holiday list.
#[derive(Debug, Clone, Default)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<TradingDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holidays(holidays: impl IntoIterator<Item = TradingDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl CalendarProvider for WeekdayCalendar {
    fn trading_dates(&self, start: TradingDate, end: TradingDate) -> Result<Vec<TradingDate>> {
        if start > end {
            return Ok(Vec::new());
        }
        let (Some(mut day), Some(last)) = (start.to_naive(), end.to_naive()) else {
            return Err(RefDataError::Calendar(format!(
                "open-ended range {start}..{end} cannot be enumerated"
            )));
        };
        let mut out = Vec::new();
        while day <= last {
            let date = TradingDate::from_naive(day);
            if !is_weekend(day) && !self.holidays.contains(&date) {
                out.push(date);
            }
            day += Duration::days(1);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn td(v: i64) -> TradingDate {
        TradingDate::from_int(v).unwrap()
    }

    #[test]
    fn static_calendar_range_is_inclusive() {
        let cal = StaticCalendar::new([td(20200106), td(20200102), td(20200103), td(20200103)]);
        assert_eq!(cal.len(), 3);
        assert_eq!(
            cal.trading_dates(td(20200103), td(20200106)).unwrap(),
            vec![td(20200103), td(20200106)]
        );
        assert!(cal.trading_dates(td(20200104), td(20200105)).unwrap().is_empty());
        assert!(cal.trading_dates(td(20200106), td(20200102)).unwrap().is_empty());
    }

    #[test]
    fn weekday_calendar_skips_weekends_and_holidays() {
        let cal = WeekdayCalendar::with_holidays([td(20200101)]);
        let dates = cal.trading_dates(td(20191231), td(20200106)).unwrap();
        assert_eq!(
            dates,
            vec![td(20191231), td(20200102), td(20200103), td(20200106)]
        );
    }

    #[test]
    fn weekday_calendar_rejects_open_end() {
        let cal = WeekdayCalendar::new();
        assert!(cal.trading_dates(td(20200101), TradingDate::OPEN_END).is_err());
    }

    #[test]
    fn loads_calendar_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "trade_date").unwrap();
        writeln!(file, "20200103").unwrap();
        writeln!(file, "2020-01-02").unwrap();
        writeln!(file).unwrap();
        let cal = StaticCalendar::from_csv(file.path()).unwrap();
        assert_eq!(cal.dates(), &[td(20200102), td(20200103)]);
    }
}
