//! Shared test utilities for tracker-db unit tests.

pub(crate) mod helpers {
    use chrono::{NaiveDate, NaiveDateTime};
    use tracker_core::enums::AttendanceStatus;
    use tracker_core::records::{AttendanceEvent, CommentState, StudentRecord};

    use crate::service::TrackerStore;

    /// Create an in-memory store.
    pub async fn test_store() -> TrackerStore {
        TrackerStore::open_local(":memory:").await.unwrap()
    }

    pub fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    pub fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    pub fn student(client_id: i64, first: &str, last: &str) -> StudentRecord {
        StudentRecord::new(client_id, first, last)
    }

    pub fn event(client_id: i64, visit_id: i64, starts_at: NaiveDateTime) -> AttendanceEvent {
        AttendanceEvent {
            client_id,
            visit_id,
            service_name: "Java Level 1".into(),
            event_name: "Java Level 1".into(),
            course_id: None,
            starts_at,
            status: AttendanceStatus::Completed,
            level: Some(1),
            comment: CommentState::Missing,
        }
    }
}
