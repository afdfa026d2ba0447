//! Pike13 reporting API client.
//!
//! Every fetch is a reporting query (`POST /desk/api/v3/reports/{report}/queries`)
//! returning rows as positional arrays in the order of the requested fields.
//! Pages are chained with `starting_after` until `has_more` is false.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value, json};

use tracker_config::SchedulingConfig;
use tracker_core::DateWindow;
use tracker_core::enums::AttendanceStatus;
use tracker_core::records::{
    AttendanceEvent, CommentState, CourseRecord, CourseSession, ScheduleEntry, StudentRecord,
    level_from_service_name,
};

use crate::error::SourceError;
use crate::http::{check_response, read_json};
use crate::{SchedulingSource, build_http};

type Row = Map<String, Value>;

const CLIENT_FIELDS: &[&str] = &[
    "person_id",
    "first_name",
    "last_name",
    "home_location_name",
    "first_visit_date",
    "custom_field_github_user",
    "custom_field_current_level",
    "custom_field_grade",
];

const ENROLLMENT_FIELDS: &[&str] = &[
    "person_id",
    "visit_id",
    "service_name",
    "event_name",
    "event_id",
    "service_date",
    "service_time",
    "state",
];

const OCCURRENCE_FIELDS: &[&str] = &[
    "event_occurrence_id",
    "event_id",
    "event_name",
    "service_name",
    "service_location_id",
    "start_at",
    "end_at",
    "capacity",
    "enrollment_count",
];

const VISIT_STATES: &[&str] = &["registered", "completed", "noshowed", "late_canceled"];

const COURSE_SERVICE_TYPE: &str = "course";

#[derive(serde::Deserialize)]
struct QueryResponse {
    data: QueryData,
}

#[derive(serde::Deserialize)]
struct QueryData {
    attributes: QueryAttributes,
}

#[derive(serde::Deserialize)]
struct QueryAttributes {
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    has_more: bool,
    last_key: Option<String>,
}

pub struct Pike13Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    tz: Tz,
}

impl Pike13Client {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &SchedulingConfig, tz: Tz) -> Result<Self, SourceError> {
        Ok(Self {
            http: build_http()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
            tz,
        })
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    async fn run_query(
        &self,
        report: &str,
        fields: &[&str],
        filter: &Value,
    ) -> Result<Vec<Row>, SourceError> {
        let url = format!("{}/desk/api/v3/reports/{report}/queries", self.base_url);
        let mut rows = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let body = query_body(fields, filter, self.page_size, starting_after.as_deref());
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            let page: QueryResponse = read_json(check_response(resp).await?).await?;
            let attrs = page.data.attributes;
            rows.extend(attrs.rows.into_iter().map(|values| zip_row(fields, values)));

            match attrs.last_key {
                Some(key) if attrs.has_more => starting_after = Some(key),
                _ => break,
            }
        }

        tracing::debug!(report, rows = rows.len(), "pike13 query complete");
        Ok(rows)
    }

    async fn fetch_visits(
        &self,
        filter: Value,
        course: bool,
    ) -> Result<Vec<AttendanceEvent>, SourceError> {
        let rows = self.run_query("enrollments", ENROLLMENT_FIELDS, &filter).await?;
        rows.iter().map(|row| event_from_row(row, course)).collect()
    }

    async fn fetch_occurrences(
        &self,
        window: &DateWindow,
        service_type: Value,
    ) -> Result<Vec<(i64, String, ScheduleEntry)>, SourceError> {
        let filter = json!(["and", [
            ["btw", "service_date", [window.start.to_string(), window.end.to_string()]],
            service_type,
        ]]);
        let rows = self
            .run_query("event_occurrences", OCCURRENCE_FIELDS, &filter)
            .await?;
        rows.iter()
            .map(|row| occurrence_from_row(row, self.tz))
            .collect()
    }
}

impl SchedulingSource for Pike13Client {
    async fn fetch_clients(&self) -> Result<Vec<StudentRecord>, SourceError> {
        let filter = json!(["eq", "person_state", "active"]);
        let rows = self.run_query("clients", CLIENT_FIELDS, &filter).await?;
        rows.iter().map(client_from_row).collect()
    }

    async fn fetch_attendance(&self, since: NaiveDate) -> Result<Vec<AttendanceEvent>, SourceError> {
        let filter = json!(["and", [
            ["btw", "service_date", [since.to_string(), self.today().to_string()]],
            ["ne", "service_type", COURSE_SERVICE_TYPE],
            any_of("state", VISIT_STATES),
        ]]);
        self.fetch_visits(filter, false).await
    }

    async fn fetch_missing_attendance(
        &self,
        before: NaiveDate,
        students: &[StudentRecord],
    ) -> Result<Vec<AttendanceEvent>, SourceError> {
        if students.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = students.iter().map(|s| s.client_id).collect();
        let filter = json!(["and", [
            ["lt", "service_date", before.to_string()],
            ["ne", "service_type", COURSE_SERVICE_TYPE],
            any_of("person_id", &ids),
            any_of("state", VISIT_STATES),
        ]]);
        self.fetch_visits(filter, false).await
    }

    async fn fetch_schedule(&self, window: &DateWindow) -> Result<Vec<ScheduleEntry>, SourceError> {
        let occurrences = self
            .fetch_occurrences(window, json!(["ne", "service_type", COURSE_SERVICE_TYPE]))
            .await?;
        Ok(occurrences.into_iter().map(|(_, _, entry)| entry).collect())
    }

    async fn fetch_courses(&self, window: &DateWindow) -> Result<Vec<CourseRecord>, SourceError> {
        let occurrences = self
            .fetch_occurrences(window, json!(["eq", "service_type", COURSE_SERVICE_TYPE]))
            .await?;
        Ok(group_courses(occurrences))
    }

    async fn fetch_course_attendance(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<AttendanceEvent>, SourceError> {
        let filter = json!(["and", [
            ["btw", "service_date", [window.start.to_string(), window.end.to_string()]],
            ["eq", "service_type", COURSE_SERVICE_TYPE],
            any_of("state", VISIT_STATES),
        ]]);
        self.fetch_visits(filter, true).await
    }
}

// ── Query construction ─────────────────────────────────────────────

fn query_body(fields: &[&str], filter: &Value, limit: u32, starting_after: Option<&str>) -> Value {
    let mut page = json!({ "limit": limit });
    if let Some(key) = starting_after {
        page["starting_after"] = json!(key);
    }
    json!({
        "data": {
            "type": "queries",
            "attributes": {
                "fields": fields,
                "filter": filter,
                "page": page,
            }
        }
    })
}

fn any_of<T: serde::Serialize>(field: &str, values: &[T]) -> Value {
    let clauses: Vec<Value> = values.iter().map(|v| json!(["eq", field, v])).collect();
    json!(["or", clauses])
}

fn zip_row(fields: &[&str], values: Vec<Value>) -> Row {
    fields
        .iter()
        .map(|f| (*f).to_string())
        .zip(values)
        .collect()
}

// ── Row mapping ────────────────────────────────────────────────────

fn missing(field: &str) -> SourceError {
    SourceError::Parse(format!("pike13 row missing '{field}'"))
}

fn req_i64(row: &Row, field: &str) -> Result<i64, SourceError> {
    match row.get(field) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| missing(field)),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| missing(field)),
        _ => Err(missing(field)),
    }
}

fn opt_i64(row: &Row, field: &str) -> Option<i64> {
    req_i64(row, field).ok()
}

fn opt_str<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn req_str<'a>(row: &'a Row, field: &str) -> Result<&'a str, SourceError> {
    opt_str(row, field).ok_or_else(|| missing(field))
}

fn count(row: &Row, field: &str) -> u32 {
    opt_i64(row, field)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn parse_day(s: &str, field: &str) -> Result<NaiveDate, SourceError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| SourceError::Parse(format!("pike13 {field} '{s}': {e}")))
}

fn local_time(row: &Row, field: &str, tz: Tz) -> Result<NaiveDateTime, SourceError> {
    let s = req_str(row, field)?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&tz).naive_local())
        .map_err(|e| SourceError::Parse(format!("pike13 {field} '{s}': {e}")))
}

fn client_from_row(row: &Row) -> Result<StudentRecord, SourceError> {
    let mut student = StudentRecord::new(
        req_i64(row, "person_id")?,
        req_str(row, "first_name")?,
        opt_str(row, "last_name").unwrap_or_default(),
    );
    student.home_location = opt_str(row, "home_location_name").map(String::from);
    student.start_date = opt_str(row, "first_visit_date")
        .map(|s| parse_day(s, "first_visit_date"))
        .transpose()?;
    student.github_user = opt_str(row, "custom_field_github_user").map(String::from);
    student.current_level = opt_str(row, "custom_field_current_level").and_then(|s| {
        s.parse::<u8>()
            .ok()
            .or_else(|| level_from_service_name(s))
    });
    student.grade = opt_str(row, "custom_field_grade").and_then(|s| s.parse().ok());
    Ok(student)
}

fn event_from_row(row: &Row, course: bool) -> Result<AttendanceEvent, SourceError> {
    let date = parse_day(req_str(row, "service_date")?, "service_date")?;
    let time = match opt_str(row, "service_time") {
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map_err(|e| SourceError::Parse(format!("pike13 service_time '{s}': {e}")))?,
        None => NaiveTime::MIN,
    };
    let state = req_str(row, "state")?;
    let status: AttendanceStatus = serde_json::from_value(Value::String(state.to_string()))
        .map_err(|_| SourceError::Parse(format!("pike13 unknown visit state '{state}'")))?;
    let service_name = req_str(row, "service_name")?.to_string();

    Ok(AttendanceEvent {
        client_id: req_i64(row, "person_id")?,
        visit_id: req_i64(row, "visit_id")?,
        level: level_from_service_name(&service_name),
        event_name: opt_str(row, "event_name").unwrap_or(&service_name).to_string(),
        service_name,
        course_id: if course { opt_i64(row, "event_id") } else { None },
        starts_at: date.and_time(time),
        status,
        comment: CommentState::Missing,
    })
}

/// `(event_id, event_name, entry)` for one occurrence.
fn occurrence_from_row(row: &Row, tz: Tz) -> Result<(i64, String, ScheduleEntry), SourceError> {
    let service_name = req_str(row, "service_name")?.to_string();
    let event_name = opt_str(row, "event_name").unwrap_or(&service_name).to_string();
    let entry = ScheduleEntry {
        schedule_id: req_i64(row, "event_occurrence_id")?,
        service_name,
        location_id: req_i64(row, "service_location_id")?,
        location_code: None,
        starts_at: local_time(row, "start_at", tz)?,
        ends_at: local_time(row, "end_at", tz)?,
        capacity: count(row, "capacity"),
        enrolled: count(row, "enrollment_count"),
    };
    Ok((req_i64(row, "event_id")?, event_name, entry))
}

/// Fold course occurrences into one record per course event.
fn group_courses(occurrences: Vec<(i64, String, ScheduleEntry)>) -> Vec<CourseRecord> {
    let mut courses: BTreeMap<i64, CourseRecord> = BTreeMap::new();
    for (event_id, name, entry) in occurrences {
        let date = entry.starts_at.date();
        let course = courses.entry(event_id).or_insert_with(|| CourseRecord {
            course_id: event_id,
            name,
            location_id: entry.location_id,
            location_code: None,
            start_date: date,
            end_date: date,
            capacity: 0,
            enrolled: 0,
            sessions: Vec::new(),
        });
        course.start_date = course.start_date.min(date);
        course.end_date = course.end_date.max(date);
        course.capacity = course.capacity.max(entry.capacity);
        course.enrolled = course.enrolled.max(entry.enrolled);
        course.sessions.push(CourseSession {
            schedule_id: entry.schedule_id,
            date,
        });
    }
    courses.into_values().collect()
}
