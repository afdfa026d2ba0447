use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::location::LocatedRecord;

/// One scheduled class occurrence.
///
/// `location_id` is the scheduling platform's ID; `location_code` is filled in
/// from the run's [`LocationLookup`](crate::LocationLookup) before the entry is
/// written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub schedule_id: i64,
    pub service_name: String,
    pub location_id: i64,
    pub location_code: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub capacity: u32,
    pub enrolled: u32,
}

impl LocatedRecord for ScheduleEntry {
    fn record_id(&self) -> i64 {
        self.schedule_id
    }

    fn location_id(&self) -> i64 {
        self.location_id
    }

    fn set_location_code(&mut self, code: String) {
        self.location_code = Some(code);
    }
}
