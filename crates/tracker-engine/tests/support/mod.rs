//! In-memory sources and store fixtures shared by the engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use tracker_core::DateWindow;
use tracker_core::enums::{AttendanceStatus, LogCode};
use tracker_core::records::{
    AttendanceEvent, CommentState, CourseRecord, CourseSession, ScheduleEntry, StudentRecord,
};
use tracker_db::TrackerStore;
use tracker_sources::{
    CodeComment, CommentScope, CommentSource, CrmSink, SchedulingSource, SourceError,
};

pub const TZ: Tz = chrono_tz::America::Los_Angeles;

/// 2024-03-12 13:00 in Los Angeles. The import starts 2024-03-05.
pub fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 12, 20, 0, 0).unwrap()
}

pub async fn store() -> TrackerStore {
    TrackerStore::open_local(":memory:").await.unwrap()
}

pub async fn log_codes(store: &TrackerStore) -> Vec<LogCode> {
    store
        .query_logs()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.code)
        .collect()
}

pub fn day(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
}

pub fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
}

pub fn student(client_id: i64, first: &str, github: Option<&str>) -> StudentRecord {
    let mut s = StudentRecord::new(client_id, first, "Student");
    s.github_user = github.map(String::from);
    s
}

pub fn visit(client_id: i64, visit_id: i64, date: &str, level: Option<u8>) -> AttendanceEvent {
    let service_name = level.map_or_else(|| "Open Lab".to_string(), |l| format!("Java Level {l}"));
    AttendanceEvent {
        client_id,
        visit_id,
        event_name: service_name.clone(),
        service_name,
        course_id: None,
        starts_at: at(date, "16:00"),
        status: AttendanceStatus::Completed,
        level,
        comment: CommentState::Missing,
    }
}

pub fn class(schedule_id: i64, location_id: i64, date: &str) -> ScheduleEntry {
    ScheduleEntry {
        schedule_id,
        service_name: "Java Level 1".into(),
        location_id,
        location_code: None,
        starts_at: at(date, "16:00"),
        ends_at: at(date, "18:00"),
        capacity: 8,
        enrolled: 5,
    }
}

/// A course holding one session per `(schedule_id, date)`.
pub fn course(course_id: i64, location_id: i64, sessions: &[(i64, &str)]) -> CourseRecord {
    let sessions: Vec<CourseSession> = sessions
        .iter()
        .map(|&(schedule_id, date)| CourseSession {
            schedule_id,
            date: day(date),
        })
        .collect();
    CourseRecord {
        course_id,
        name: "Spring Python Course".into(),
        location_id,
        location_code: None,
        start_date: sessions.iter().map(|s| s.date).min().unwrap(),
        end_date: sessions.iter().map(|s| s.date).max().unwrap(),
        capacity: 12,
        enrolled: 9,
        sessions,
    }
}

/// A commit pushed at `hour` UTC on `date`.
pub fn commit(login: &str, repo: &str, message: &str, date: &str, hour: u32) -> CodeComment {
    let date = day(date);
    CodeComment {
        author_login: login.into(),
        repo: repo.into(),
        message: message.into(),
        committed_at: Utc
            .from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap()),
    }
}

pub fn rate_limited() -> SourceError {
    SourceError::RateLimited {
        retry_after_secs: 60,
    }
}

pub fn malformed() -> SourceError {
    SourceError::Parse("unexpected end of input".into())
}

pub fn rejected_credentials() -> SourceError {
    SourceError::Auth {
        status: 401,
        message: "invalid token".into(),
    }
}

// ── Scheduling ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeScheduling {
    pub clients: Vec<StudentRecord>,
    pub attendance: Vec<AttendanceEvent>,
    /// Returned by the missing-attendance fetch, filtered to the requested
    /// students.
    pub history: Vec<AttendanceEvent>,
    pub schedule: Vec<ScheduleEntry>,
    pub courses: Vec<CourseRecord>,
    pub course_attendance: Vec<AttendanceEvent>,
    /// Fetches that fail, by method name.
    pub failures: HashMap<&'static str, fn() -> SourceError>,
    pub missing_requests: Mutex<Vec<(NaiveDate, Vec<i64>)>>,
}

impl FakeScheduling {
    pub fn failing(mut self, method: &'static str, error: fn() -> SourceError) -> Self {
        self.failures.insert(method, error);
        self
    }

    fn check(&self, method: &str) -> Result<(), SourceError> {
        match self.failures.get(method) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

impl SchedulingSource for FakeScheduling {
    async fn fetch_clients(&self) -> Result<Vec<StudentRecord>, SourceError> {
        self.check("fetch_clients")?;
        Ok(self.clients.clone())
    }

    async fn fetch_attendance(&self, since: NaiveDate) -> Result<Vec<AttendanceEvent>, SourceError> {
        self.check("fetch_attendance")?;
        Ok(self
            .attendance
            .iter()
            .filter(|e| e.service_date() >= since)
            .cloned()
            .collect())
    }

    async fn fetch_missing_attendance(
        &self,
        before: NaiveDate,
        students: &[StudentRecord],
    ) -> Result<Vec<AttendanceEvent>, SourceError> {
        self.check("fetch_missing_attendance")?;
        let ids: Vec<i64> = students.iter().map(|s| s.client_id).collect();
        self.missing_requests
            .lock()
            .unwrap()
            .push((before, ids.clone()));
        Ok(self
            .history
            .iter()
            .filter(|e| ids.contains(&e.client_id) && e.service_date() < before)
            .cloned()
            .collect())
    }

    async fn fetch_schedule(&self, _window: &DateWindow) -> Result<Vec<ScheduleEntry>, SourceError> {
        self.check("fetch_schedule")?;
        Ok(self.schedule.clone())
    }

    async fn fetch_courses(&self, _window: &DateWindow) -> Result<Vec<CourseRecord>, SourceError> {
        self.check("fetch_courses")?;
        Ok(self.courses.clone())
    }

    async fn fetch_course_attendance(
        &self,
        _window: &DateWindow,
    ) -> Result<Vec<AttendanceEvent>, SourceError> {
        self.check("fetch_course_attendance")?;
        Ok(self.course_attendance.clone())
    }
}

// ── Code host ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeComments {
    pub by_scope: HashMap<CommentScope, Vec<CodeComment>>,
    pub by_user: HashMap<String, Vec<CodeComment>>,
    pub rate_limited: Vec<CommentScope>,
    /// Every request, as `scope` or `user:login`.
    pub requests: Mutex<Vec<String>>,
}

impl FakeComments {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl CommentSource for FakeComments {
    async fn fetch_comments(
        &self,
        scope: CommentScope,
        _since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError> {
        self.requests.lock().unwrap().push(scope.to_string());
        if self.rate_limited.contains(&scope) {
            return Err(rate_limited());
        }
        Ok(self.by_scope.get(&scope).cloned().unwrap_or_default())
    }

    async fn fetch_user_comments(
        &self,
        login: &str,
        _since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError> {
        self.requests.lock().unwrap().push(format!("user:{login}"));
        Ok(self.by_user.get(login).cloned().unwrap_or_default())
    }
}

// ── CRM ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCrm {
    /// Connect attempts that fail before one succeeds.
    pub connect_failures: u32,
    /// Stage whose upsert fails: "contacts", "attendance", or "schedule".
    pub failing_stage: Option<&'static str>,
    pub connects: Mutex<u32>,
    pub disconnects: Mutex<u32>,
    pub received: Mutex<Vec<(&'static str, usize)>>,
}

impl FakeCrm {
    fn receive(&self, stage: &'static str, count: usize) -> Result<usize, SourceError> {
        if self.failing_stage == Some(stage) {
            return Err(SourceError::Api {
                status: 400,
                message: format!("{stage} rejected"),
            });
        }
        self.received.lock().unwrap().push((stage, count));
        Ok(count)
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }

    pub fn disconnects(&self) -> u32 {
        *self.disconnects.lock().unwrap()
    }
}

impl CrmSink for FakeCrm {
    async fn connect(&self) -> Result<(), SourceError> {
        let mut connects = self.connects.lock().unwrap();
        *connects += 1;
        if *connects <= self.connect_failures {
            return Err(SourceError::ConnectionFailed("login refused".into()));
        }
        Ok(())
    }

    async fn upsert_contacts(&self, students: &[StudentRecord]) -> Result<usize, SourceError> {
        self.receive("contacts", students.len())
    }

    async fn upsert_attendance(&self, events: &[AttendanceEvent]) -> Result<usize, SourceError> {
        self.receive("attendance", events.len())
    }

    async fn upsert_schedule(&self, entries: &[ScheduleEntry]) -> Result<usize, SourceError> {
        self.receive("schedule", entries.len())
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap() += 1;
    }
}
