use chrono::{Datelike, Days, NaiveDate};

use crate::core::models::usage::{InvalidRange, UsageQuery};

/// Current calendar month through tomorrow.
pub fn this_month(today: NaiveDate) -> UsageQuery {
    UsageQuery {
        start_date: today.with_day(1).unwrap_or(today),
        end_date: tomorrow(today),
    }
}

/// Everything since `history_start` through tomorrow.
pub fn all_time(today: NaiveDate, history_start: NaiveDate) -> Result<UsageQuery, InvalidRange> {
    UsageQuery::new(history_start, tomorrow(today))
}

/// Fallback start of the all-time window: the most recent May 1 on or
/// before `today`, so the default range is never inverted.
pub fn default_history_start(today: NaiveDate) -> NaiveDate {
    let year = if today.month() < 5 {
        today.year() - 1
    } else {
        today.year()
    };
    NaiveDate::from_ymd_opt(year, 5, 1).unwrap_or(today)
}

/// Parse a `YYYY-MM` month boundary into the first day of that month.
pub fn parse_history_start(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn tomorrow(today: NaiveDate) -> NaiveDate {
    today.checked_add_days(Days::new(1)).unwrap_or(today)
}
