use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::location::LocatedRecord;

/// A multi-session course and the schedule occurrences that belong to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRecord {
    pub course_id: i64,
    pub name: String,
    pub location_id: i64,
    pub location_code: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capacity: u32,
    pub enrolled: u32,
    pub sessions: Vec<CourseSession>,
}

/// One dated occurrence of a course, keyed by the external ID of its
/// [`ScheduleEntry`](super::ScheduleEntry).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CourseSession {
    pub schedule_id: i64,
    pub date: NaiveDate,
}

impl CourseRecord {
    #[must_use]
    pub fn session_ids(&self) -> Vec<i64> {
        self.sessions.iter().map(|s| s.schedule_id).collect()
    }
}

impl LocatedRecord for CourseRecord {
    fn record_id(&self) -> i64 {
        self.course_id
    }

    fn location_id(&self) -> i64 {
        self.location_id
    }

    fn set_location_code(&mut self, code: String) {
        self.location_code = Some(code);
    }
}
