use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::LagWindow;

/// Incubation and reporting delay between weather exposure and case reporting.
pub const LAG_DAYS: i64 = 14;

pub fn iso_week_of(date: NaiveDate) -> LagWindow {
    let week = date.iso_week();
    LagWindow {
        iso_year: week.year(),
        iso_week: week.week(),
    }
}

/// ISO week/year of the day `LAG_DAYS` before `date`.
pub fn lag_window(date: NaiveDate) -> LagWindow {
    iso_week_of(date - Duration::days(LAG_DAYS))
}

/// Monday of the given ISO week. Week 53 of a 52-week year rolls into week 1 of
/// the next year rather than failing. Returns `None` only outside chrono's
/// supported date range.
pub fn week_start(iso_year: i32, iso_week: u32) -> Option<NaiveDate> {
    let jan_fourth = NaiveDate::from_ymd_opt(iso_year, 1, 4)?;
    let first_monday =
        jan_fourth - Duration::days(i64::from(jan_fourth.weekday().num_days_from_monday()));
    first_monday.checked_add_signed(Duration::weeks(i64::from(iso_week) - 1))
}

/// Lag window of a dengue reporting week, anchored on that week's Monday.
pub fn lag_window_for_week(iso_year: i32, iso_week: u32) -> Option<LagWindow> {
    week_start(iso_year, iso_week).map(lag_window)
}

/// Current and lagged ISO coordinates for a calendar date, as used by the live
/// prediction path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateParts {
    pub current: LagWindow,
    pub lagged: LagWindow,
}

impl DateParts {
    pub fn extract(date: NaiveDate) -> Self {
        Self {
            current: iso_week_of(date),
            lagged: lag_window(date),
        }
    }
}
