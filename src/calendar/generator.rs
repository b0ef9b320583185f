//! Monthly period generator
//!
//! Produces the ordered (period end, attained age) sequence the projection
//! iterates over. The sequence covers the month containing the start date
//! through the month containing the end date.

use super::{age_on, last_day_of_month, ScheduleError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One simulated month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Zero-based position in the sequence
    pub index: u32,

    /// First simulated day of the month (clamped to the start date)
    pub period_start: NaiveDate,

    /// Last calendar day of the month
    pub period_end: NaiveDate,

    /// Whole years attained at period end
    pub age: u32,
}

impl Period {
    pub fn year(&self) -> i32 {
        self.period_end.year()
    }

    pub fn month(&self) -> u32 {
        self.period_end.month()
    }

    /// December periods carry the annual interest credit
    pub fn is_year_end(&self) -> bool {
        self.month() == 12
    }

    /// `YYYY-MM` key used in reports
    pub fn key(&self) -> String {
        self.period_end.format("%Y-%m").to_string()
    }
}

/// Restartable generator of monthly periods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodGenerator {
    start_date: NaiveDate,
    end_date: NaiveDate,
    birth_date: NaiveDate,
}

impl PeriodGenerator {
    /// Validate the inputs up front so errors never surface mid-projection
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        birth_date: NaiveDate,
    ) -> Result<Self, ScheduleError> {
        if end_date < start_date {
            return Err(ScheduleError::EndBeforeStart {
                start: start_date,
                end: end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
            birth_date,
        })
    }

    /// Build from `YYYY-MM-DD` strings
    pub fn from_strs(start: &str, end: &str, birth: &str) -> Result<Self, ScheduleError> {
        Self::new(
            super::parse_date("start_date", start)?,
            super::parse_date("end_date", end)?,
            super::parse_date("birth_date", birth)?,
        )
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    /// Fresh iterator over the periods; call again to restart
    pub fn periods(&self) -> Periods {
        Periods {
            generator: *self,
            year: self.start_date.year(),
            month: self.start_date.month(),
            index: 0,
        }
    }

    /// Number of periods the sequence yields
    pub fn len(&self) -> usize {
        let months = (self.end_date.year() - self.start_date.year()) * 12
            + self.end_date.month() as i32
            - self.start_date.month() as i32;
        (months + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Lazy iterator returned by [`PeriodGenerator::periods`]
#[derive(Debug, Clone)]
pub struct Periods {
    generator: PeriodGenerator,
    year: i32,
    month: u32,
    index: u32,
}

impl Iterator for Periods {
    type Item = Period;

    fn next(&mut self) -> Option<Self::Item> {
        let first_of_month = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        if first_of_month > self.generator.end_date {
            return None;
        }

        let period_end = last_day_of_month(self.year, self.month)?;
        let period = Period {
            index: self.index,
            period_start: first_of_month.max(self.generator.start_date),
            period_end,
            age: age_on(self.generator.birth_date, period_end),
        };

        if self.month == 12 {
            self.year += 1;
            self.month = 1;
        } else {
            self.month += 1;
        }
        self.index += 1;

        Some(period)
    }
}
