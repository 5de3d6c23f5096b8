use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};

use crate::models::{DateRange, Period};

fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn first_day_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Parse a `YYYY-MM` month into its first day.
pub fn parse_month(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", value))
}

/// Period of the month containing `today`: from its first day to the first day of the next month.
pub fn current_month(today: NaiveDate) -> Period {
    let start = first_day_of_month(today);
    Period::new(start, first_day_of_next_month(start), DateRange::Monthly)
}

/// One monthly period per calendar month from `first` to `last`, both months included.
///
/// Each period spans the first to the last day of its month.
pub fn monthly_periods(first: NaiveDate, last: NaiveDate) -> Result<Vec<Period>> {
    let first = first_day_of_month(first);
    let last = first_day_of_month(last);
    if last < first {
        return Err(anyhow!("Period window ends ({}) before it starts ({})", last, first));
    }

    let mut periods = Vec::new();
    let mut start = first;
    while start <= last {
        let next = first_day_of_next_month(start);
        let end = next.pred_opt().unwrap_or(start);
        periods.push(Period::new(start, end, DateRange::Monthly));
        start = next;
    }
    Ok(periods)
}

/// Human title of a month, e.g. `June 2019`.
pub fn month_title(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// `YYYYMM` stamp used in report file names.
pub fn month_stamp(date: NaiveDate) -> String {
    date.format("%Y%m").to_string()
}
