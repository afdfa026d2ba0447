//! Rolling date windows, computed from "today" in the tracker's time zone.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Format used for run start/end stamps.
pub const RUN_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive range of local dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::Validation(format!(
                "window end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// `today - past_days` through `today + future_days`.
    #[must_use]
    pub fn around(today: NaiveDate, past_days: u32, future_days: u32) -> Self {
        Self {
            start: days_before(today, past_days),
            end: today
                .checked_add_days(Days::new(u64::from(future_days)))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[must_use]
pub fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// The calendar date of `now` in `tz`.
#[must_use]
pub fn local_today(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// `now` in `tz`, formatted as a run stamp.
#[must_use]
pub fn local_stamp(tz: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&tz).format(RUN_STAMP_FORMAT).to_string()
}
