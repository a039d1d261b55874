//! Date ranges and the fixed-size search windows cut from them.

use std::fmt;

use chrono::{Duration, NaiveDate};

use crate::error::{AppError, Result};

/// A half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting empty or inverted bounds.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(AppError::validation(format!(
                "start date {start} must be before end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The inclusive year span `[start_year, end_year]`.
    pub fn from_years(start_year: i32, end_year: i32) -> Result<Self> {
        let start = year_start(start_year)?;
        let end = year_start(end_year + 1)?;
        Self::new(start, end)
    }

    /// Last day covered by the range.
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }

    /// Cut the range into consecutive windows of `chunk_days`; the last one is clamped.
    pub fn windows(&self, chunk_days: u32) -> Vec<DateWindow> {
        let step = Duration::days(i64::from(chunk_days.max(1)));
        let mut windows = Vec::new();
        let mut current = self.start;

        while current < self.end {
            let until = (current + step).min(self.end);
            windows.push(DateWindow {
                since: current,
                until,
            });
            current = until;
        }
        windows
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start, self.last_day())
    }
}

/// One search window. `until` is exclusive, matching X's `until:` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.since <= day && day < self.until
    }

    pub fn last_day(&self) -> NaiveDate {
        self.until - Duration::days(1)
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}

/// January 1st of `year`.
pub fn year_start(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| AppError::validation(format!("invalid year {year}")))
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?)
}
