//! Calendar arithmetic for the monthly projection timeline

mod generator;

pub use generator::{Period, PeriodGenerator, Periods};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Date format used in configuration files and reports
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while building the period sequence
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Malformed {field} date '{value}' (expected YYYY-MM-DD)")]
    MalformedDate { field: &'static str, value: String },

    #[error("End date {end} precedes start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Parse a `YYYY-MM-DD` date, naming the field in the error
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ScheduleError::MalformedDate {
        field,
        value: value.to_string(),
    })
}

/// Whole years attained on `on` by someone born on `birth`.
///
/// The age increments on the birthday itself: born July 6, the age on
/// July 5 is still the previous year's.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut age = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Last calendar day of the given month (leap years respected)
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}
