//! Salesforce REST client.
//!
//! Sessions come from the OAuth username-password flow. Records are written
//! with the composite upsert endpoint, keyed by an external-ID field that
//! holds the scheduling platform's ID, in batches of at most `batch_size`.

use chrono::{NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use tracker_config::CrmConfig;
use tracker_core::records::{AttendanceEvent, CommentState, ScheduleEntry, StudentRecord};

use crate::error::SourceError;
use crate::http::{check_response, read_json};
use crate::{CrmSink, build_http};

/// Target object and its external-ID field.
#[derive(Debug, Clone, Copy)]
struct SObject {
    name: &'static str,
    external_id: &'static str,
}

const CONTACT: SObject = SObject {
    name: "Contact",
    external_id: "Front_Desk_Id__c",
};

const ATTENDANCE: SObject = SObject {
    name: "Student_Attendance__c",
    external_id: "Visit_Id__c",
};

const SCHEDULE: SObject = SObject {
    name: "Class_Schedule__c",
    external_id: "Schedule_Id__c",
};

#[derive(Debug, Clone, serde::Deserialize)]
struct Session {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct SaveResult {
    #[serde(default)]
    id: Option<String>,
    success: bool,
    #[serde(default)]
    errors: Vec<SaveError>,
}

#[derive(Debug, serde::Deserialize)]
struct SaveError {
    #[serde(rename = "statusCode", default)]
    status_code: String,
    #[serde(default)]
    message: String,
}

pub struct SalesforceClient {
    http: reqwest::Client,
    config: CrmConfig,
    tz: Tz,
    session: RwLock<Option<Session>>,
}

impl SalesforceClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &CrmConfig, tz: Tz) -> Result<Self, SourceError> {
        Ok(Self {
            http: build_http()?,
            config: config.clone(),
            tz,
            session: RwLock::new(None),
        })
    }

    fn login_endpoint(&self, path: &str) -> String {
        format!("{}/services/oauth2/{path}", self.config.login_url.trim_end_matches('/'))
    }

    async fn current_session(&self) -> Result<Session, SourceError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| SourceError::ConnectionFailed("no active CRM session".into()))
    }

    async fn upsert(&self, target: SObject, records: Vec<Value>) -> Result<usize, SourceError> {
        if records.is_empty() {
            return Ok(0);
        }
        let session = self.current_session().await?;
        let url = format!(
            "{}/services/data/{}/composite/sobjects/{}/{}",
            session.instance_url.trim_end_matches('/'),
            self.config.api_version,
            target.name,
            target.external_id,
        );

        let mut accepted = 0;
        for chunk in records.chunks(self.config.batch_size.clamp(1, 200)) {
            let body = json!({ "allOrNone": false, "records": chunk });
            let resp = self
                .http
                .patch(&url)
                .bearer_auth(&session.access_token)
                .json(&body)
                .send()
                .await?;
            let results: Vec<SaveResult> = read_json(check_response(resp).await?).await?;
            accepted += count_accepted(target, &results);
        }

        tracing::debug!(sobject = target.name, sent = records.len(), accepted, "crm upsert");
        Ok(accepted)
    }

    /// Local wall-clock time as an absolute CRM datetime.
    fn crm_datetime(&self, local: NaiveDateTime) -> String {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map_or_else(|| Utc.from_utc_datetime(&local), |dt| dt.with_timezone(&Utc))
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn attendance_record(&self, event: &AttendanceEvent) -> Value {
        let (comment, repo) = match &event.comment {
            CommentState::Authored { text, repo } => (Some(text.as_str()), repo.as_deref()),
            CommentState::Missing | CommentState::Processed => (None, None),
        };
        json!({
            "attributes": { "type": ATTENDANCE.name },
            "Visit_Id__c": event.visit_id.to_string(),
            "Contact__r": { "Front_Desk_Id__c": event.client_id.to_string() },
            "Service_Name__c": event.service_name,
            "Event_Name__c": event.event_name,
            "Service_Date__c": event.service_date().to_string(),
            "Start_Time__c": self.crm_datetime(event.starts_at),
            "Status__c": event.status.as_str(),
            "Level__c": event.level,
            "Course_Id__c": event.course_id.map(|id| id.to_string()),
            "Comment__c": comment,
            "Repo_Name__c": repo,
        })
    }

    fn schedule_record(&self, entry: &ScheduleEntry) -> Value {
        json!({
            "attributes": { "type": SCHEDULE.name },
            "Schedule_Id__c": entry.schedule_id.to_string(),
            "Service_Name__c": entry.service_name,
            "Location__c": entry.location_code,
            "Start_Time__c": self.crm_datetime(entry.starts_at),
            "End_Time__c": self.crm_datetime(entry.ends_at),
            "Capacity__c": entry.capacity,
            "Enrolled__c": entry.enrolled,
        })
    }
}

impl CrmSink for SalesforceClient {
    async fn connect(&self) -> Result<(), SourceError> {
        let body = form_body(&[
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.user.as_str()),
            ("password", self.config.key.as_str()),
        ]);
        let resp = self
            .http
            .post(self.login_endpoint("token"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
        let session: Session = read_json(check_response(resp).await?).await?;

        tracing::info!(instance = %session.instance_url, "crm session established");
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn upsert_contacts(&self, students: &[StudentRecord]) -> Result<usize, SourceError> {
        let records = students.iter().map(contact_record).collect();
        self.upsert(CONTACT, records).await
    }

    async fn upsert_attendance(&self, events: &[AttendanceEvent]) -> Result<usize, SourceError> {
        let records = events.iter().map(|e| self.attendance_record(e)).collect();
        self.upsert(ATTENDANCE, records).await
    }

    async fn upsert_schedule(&self, entries: &[ScheduleEntry]) -> Result<usize, SourceError> {
        let records = entries.iter().map(|e| self.schedule_record(e)).collect();
        self.upsert(SCHEDULE, records).await
    }

    async fn disconnect(&self) {
        let Some(session) = self.session.write().await.take() else {
            return;
        };
        let result = self
            .http
            .post(self.login_endpoint("revoke"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form_body(&[("token", session.access_token.as_str())]))
            .send()
            .await;
        match result {
            Ok(resp) => {
                if let Err(e) = check_response(resp).await {
                    tracing::warn!(error = %e, "crm session revoke rejected");
                }
            }
            Err(e) => tracing::warn!(error = %e, "crm session revoke failed"),
        }
    }
}

fn form_body(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn optional_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.to_string())
}

fn contact_record(student: &StudentRecord) -> Value {
    json!({
        "attributes": { "type": CONTACT.name },
        "Front_Desk_Id__c": student.client_id.to_string(),
        "FirstName": student.first_name,
        "LastName": student.last_name,
        "GitHub_User__c": student.github_user,
        "Home_Location__c": student.home_location,
        "Start_Date__c": optional_date(student.start_date),
        "Current_Level__c": student.current_level,
        "Grade__c": student.grade,
        "Active__c": student.active,
    })
}

fn count_accepted(target: SObject, results: &[SaveResult]) -> usize {
    let mut accepted = 0;
    for result in results {
        if result.success {
            accepted += 1;
            continue;
        }
        for error in &result.errors {
            tracing::warn!(
                sobject = target.name,
                id = result.id.as_deref().unwrap_or("-"),
                code = %error.status_code,
                "{}",
                error.message
            );
        }
    }
    accepted
}
