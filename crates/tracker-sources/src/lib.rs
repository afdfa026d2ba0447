//! # tracker-sources
//!
//! Clients for the three external services the import talks to, behind one
//! capability trait each:
//! - [`SchedulingSource`]: students, attendance, schedule, and courses
//!   (Pike13 reporting API)
//! - [`CommentSource`]: commit messages used as code-review comments (GitHub
//!   commit search)
//! - [`CrmSink`]: contact, attendance, and schedule export (Salesforce REST)
//!
//! Service versions and endpoints come from configuration. The engine only
//! depends on the traits; tests substitute in-memory fakes.

pub mod github;
pub mod pike13;
pub mod salesforce;

mod error;
mod http;

pub use error::SourceError;
pub use github::GithubClient;
pub use pike13::Pike13Client;
pub use salesforce::SalesforceClient;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use tracker_core::DateWindow;
use tracker_core::records::{AttendanceEvent, CourseRecord, ScheduleEntry, StudentRecord};

const USER_AGENT: &str = "student-tracker/0.1";

// ── Types ──────────────────────────────────────────────────────────

/// Which repositories a comment fetch searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentScope {
    /// The main student organization.
    Organization,
    /// The organization holding repositories for one class level.
    Level(u8),
}

impl std::fmt::Display for CommentScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization => f.write_str("organization"),
            Self::Level(level) => write!(f, "level {level}"),
        }
    }
}

/// One commit, treated as a student's review comment for the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeComment {
    pub author_login: String,
    pub repo: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
}

impl CodeComment {
    /// Calendar date of the commit in the tracker's time zone.
    #[must_use]
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        self.committed_at.with_timezone(&tz).date_naive()
    }
}

// ── Capability traits ──────────────────────────────────────────────

/// Class-scheduling platform.
#[allow(async_fn_in_trait)]
pub trait SchedulingSource {
    /// Every currently active client.
    async fn fetch_clients(&self) -> Result<Vec<StudentRecord>, SourceError>;

    /// Visits on or after `since`, through today.
    async fn fetch_attendance(&self, since: NaiveDate) -> Result<Vec<AttendanceEvent>, SourceError>;

    /// All visits before `before` for the given students.
    async fn fetch_missing_attendance(
        &self,
        before: NaiveDate,
        students: &[StudentRecord],
    ) -> Result<Vec<AttendanceEvent>, SourceError>;

    /// Class occurrences starting inside `window`.
    async fn fetch_schedule(&self, window: &DateWindow) -> Result<Vec<ScheduleEntry>, SourceError>;

    /// Courses with sessions inside `window`.
    async fn fetch_courses(&self, window: &DateWindow) -> Result<Vec<CourseRecord>, SourceError>;

    /// Course visits inside `window`.
    async fn fetch_course_attendance(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<AttendanceEvent>, SourceError>;
}

/// Code host whose commit messages serve as review comments.
#[allow(async_fn_in_trait)]
pub trait CommentSource {
    /// Commits in `scope` on or after `since`.
    async fn fetch_comments(
        &self,
        scope: CommentScope,
        since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError>;

    /// Commits authored by `login` on or after `since`, in any repository.
    async fn fetch_user_comments(
        &self,
        login: &str,
        since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError>;
}

/// CRM the tracker exports into. Upserts return the number of records the
/// CRM accepted. The session lives inside the sink, so every method takes
/// `&self` and a connect attempt can be retried.
#[allow(async_fn_in_trait)]
pub trait CrmSink {
    async fn connect(&self) -> Result<(), SourceError>;

    async fn upsert_contacts(&self, students: &[StudentRecord]) -> Result<usize, SourceError>;

    async fn upsert_attendance(&self, events: &[AttendanceEvent]) -> Result<usize, SourceError>;

    async fn upsert_schedule(&self, entries: &[ScheduleEntry]) -> Result<usize, SourceError>;

    /// End the session. Never fails; problems are only logged.
    async fn disconnect(&self);
}

fn build_http() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(SourceError::from)
}
