//! Log codes, attendance states, and the stage state machines of the import.
//!
//! String forms are the values stored in SQL and written to the log trail.
//! State machines provide `allowed_next_states()` so the engine can check
//! every transition it makes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// AttendanceStatus
// ---------------------------------------------------------------------------

/// Attendance state of a single visit, as reported by the scheduling platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Registered,
    Completed,
    #[serde(rename = "noshowed")]
    NoShow,
    #[serde(rename = "late_canceled")]
    LateCancel,
}

impl AttendanceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Completed => "completed",
            Self::NoShow => "noshowed",
            Self::LateCancel => "late_canceled",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogCode
// ---------------------------------------------------------------------------

/// Marker codes written to the append-only log trail.
///
/// The numeric value is what the `log_data` table stores; the screaming-case
/// name is what operators grep for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogCode {
    StartingStudentImport,
    StudentImportComplete,
    StudentImportAborted,
    StartingAttendanceImport,
    AttendanceImportComplete,
    AttendanceImportAborted,
    StartingScheduleImport,
    ScheduleImportComplete,
    ScheduleImportAborted,
    StartingCourseImport,
    CourseImportComplete,
    CourseImportAborted,
    StartingCourseAttendanceImport,
    CourseAttendanceImportComplete,
    CourseAttendanceImportAborted,
    StartingGithubImport,
    GithubImportComplete,
    GithubImportAborted,
    LocationNotFound,
    LogDataPruned,
    ImportAborted,
    StartingCrmExport,
    CrmExportComplete,
    CrmExportAborted,
    CrmConnectionError,
    CrmExportError,
}

impl LogCode {
    pub const ALL: [Self; 26] = [
        Self::StartingStudentImport,
        Self::StudentImportComplete,
        Self::StudentImportAborted,
        Self::StartingAttendanceImport,
        Self::AttendanceImportComplete,
        Self::AttendanceImportAborted,
        Self::StartingScheduleImport,
        Self::ScheduleImportComplete,
        Self::ScheduleImportAborted,
        Self::StartingCourseImport,
        Self::CourseImportComplete,
        Self::CourseImportAborted,
        Self::StartingCourseAttendanceImport,
        Self::CourseAttendanceImportComplete,
        Self::CourseAttendanceImportAborted,
        Self::StartingGithubImport,
        Self::GithubImportComplete,
        Self::GithubImportAborted,
        Self::LocationNotFound,
        Self::LogDataPruned,
        Self::ImportAborted,
        Self::StartingCrmExport,
        Self::CrmExportComplete,
        Self::CrmExportAborted,
        Self::CrmConnectionError,
        Self::CrmExportError,
    ];

    /// Numeric code stored in the `log_data.code` column.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::StartingStudentImport => 10,
            Self::StudentImportComplete => 11,
            Self::StudentImportAborted => 12,
            Self::StartingAttendanceImport => 20,
            Self::AttendanceImportComplete => 21,
            Self::AttendanceImportAborted => 22,
            Self::StartingScheduleImport => 30,
            Self::ScheduleImportComplete => 31,
            Self::ScheduleImportAborted => 32,
            Self::StartingCourseImport => 40,
            Self::CourseImportComplete => 41,
            Self::CourseImportAborted => 42,
            Self::StartingCourseAttendanceImport => 50,
            Self::CourseAttendanceImportComplete => 51,
            Self::CourseAttendanceImportAborted => 52,
            Self::StartingGithubImport => 60,
            Self::GithubImportComplete => 61,
            Self::GithubImportAborted => 62,
            Self::LocationNotFound => 70,
            Self::LogDataPruned => 80,
            Self::ImportAborted => 90,
            Self::StartingCrmExport => 100,
            Self::CrmExportComplete => 101,
            Self::CrmExportAborted => 102,
            Self::CrmConnectionError => 103,
            Self::CrmExportError => 104,
        }
    }

    /// Reverse of [`LogCode::code`].
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartingStudentImport => "STARTING_STUDENT_IMPORT",
            Self::StudentImportComplete => "STUDENT_IMPORT_COMPLETE",
            Self::StudentImportAborted => "STUDENT_IMPORT_ABORTED",
            Self::StartingAttendanceImport => "STARTING_ATTENDANCE_IMPORT",
            Self::AttendanceImportComplete => "ATTENDANCE_IMPORT_COMPLETE",
            Self::AttendanceImportAborted => "ATTENDANCE_IMPORT_ABORTED",
            Self::StartingScheduleImport => "STARTING_SCHEDULE_IMPORT",
            Self::ScheduleImportComplete => "SCHEDULE_IMPORT_COMPLETE",
            Self::ScheduleImportAborted => "SCHEDULE_IMPORT_ABORTED",
            Self::StartingCourseImport => "STARTING_COURSE_IMPORT",
            Self::CourseImportComplete => "COURSE_IMPORT_COMPLETE",
            Self::CourseImportAborted => "COURSE_IMPORT_ABORTED",
            Self::StartingCourseAttendanceImport => "STARTING_COURSE_ATTENDANCE_IMPORT",
            Self::CourseAttendanceImportComplete => "COURSE_ATTENDANCE_IMPORT_COMPLETE",
            Self::CourseAttendanceImportAborted => "COURSE_ATTENDANCE_IMPORT_ABORTED",
            Self::StartingGithubImport => "STARTING_GITHUB_IMPORT",
            Self::GithubImportComplete => "GITHUB_IMPORT_COMPLETE",
            Self::GithubImportAborted => "GITHUB_IMPORT_ABORTED",
            Self::LocationNotFound => "LOCATION_NOT_FOUND",
            Self::LogDataPruned => "LOG_DATA_PRUNED",
            Self::ImportAborted => "IMPORT_ABORTED",
            Self::StartingCrmExport => "STARTING_CRM_EXPORT",
            Self::CrmExportComplete => "CRM_EXPORT_COMPLETE",
            Self::CrmExportAborted => "CRM_EXPORT_ABORTED",
            Self::CrmConnectionError => "CRM_CONNECTION_ERROR",
            Self::CrmExportError => "CRM_EXPORT_ERROR",
        }
    }

    /// Human-readable prefix for the log message; the detail text follows it.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::StartingStudentImport => "*** START Student import",
            Self::StudentImportComplete => "*** Student import complete",
            Self::StudentImportAborted => "*** Student import aborted",
            Self::StartingAttendanceImport => "*** START Attendance import",
            Self::AttendanceImportComplete => "*** Attendance import complete",
            Self::AttendanceImportAborted => "*** Attendance import aborted",
            Self::StartingScheduleImport => "*** START Schedule import",
            Self::ScheduleImportComplete => "*** Schedule import complete",
            Self::ScheduleImportAborted => "*** Schedule import aborted",
            Self::StartingCourseImport => "*** START Course import",
            Self::CourseImportComplete => "*** Course import complete",
            Self::CourseImportAborted => "*** Course import aborted",
            Self::StartingCourseAttendanceImport => "*** START Course attendance import",
            Self::CourseAttendanceImportComplete => "*** Course attendance import complete",
            Self::CourseAttendanceImportAborted => "*** Course attendance import aborted",
            Self::StartingGithubImport => "*** START Github comments import",
            Self::GithubImportComplete => "*** Github comments import complete",
            Self::GithubImportAborted => "*** Github comments import aborted",
            Self::LocationNotFound => "Location not found",
            Self::LogDataPruned => "Old log data removed",
            Self::ImportAborted => "*** Import aborted",
            Self::StartingCrmExport => "*** START CRM export",
            Self::CrmExportComplete => "*** CRM export complete",
            Self::CrmExportAborted => "*** CRM export aborted",
            Self::CrmConnectionError => "CRM connection failed",
            Self::CrmExportError => "CRM export error",
        }
    }

    /// Whether this code marks a stage or run that did not finish.
    #[must_use]
    pub const fn is_abort(self) -> bool {
        matches!(
            self,
            Self::StudentImportAborted
                | Self::AttendanceImportAborted
                | Self::ScheduleImportAborted
                | Self::CourseImportAborted
                | Self::CourseAttendanceImportAborted
                | Self::GithubImportAborted
                | Self::ImportAborted
                | Self::CrmExportAborted
        )
    }
}

impl fmt::Display for LogCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ImportStage
// ---------------------------------------------------------------------------

/// Start/complete/abort bracket written around one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMarkers {
    pub start: LogCode,
    pub complete: LogCode,
    pub aborted: LogCode,
}

/// State of an import run.
///
/// ```text
/// idle → student_sync → attendance_sync → schedule_sync → course_sync
///      → course_attendance_sync → comment_sync → complete
/// (any sync stage) → aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Idle,
    StudentSync,
    AttendanceSync,
    ScheduleSync,
    CourseSync,
    CourseAttendanceSync,
    CommentSync,
    Complete,
    Aborted,
}

impl ImportStage {
    /// The sync stages in execution order.
    pub const SYNC_STAGES: [Self; 6] = [
        Self::StudentSync,
        Self::AttendanceSync,
        Self::ScheduleSync,
        Self::CourseSync,
        Self::CourseAttendanceSync,
        Self::CommentSync,
    ];

    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::StudentSync, Self::Aborted],
            Self::StudentSync => &[Self::AttendanceSync, Self::Aborted],
            Self::AttendanceSync => &[Self::ScheduleSync, Self::Aborted],
            Self::ScheduleSync => &[Self::CourseSync, Self::Aborted],
            Self::CourseSync => &[Self::CourseAttendanceSync, Self::Aborted],
            Self::CourseAttendanceSync => &[Self::CommentSync, Self::Aborted],
            Self::CommentSync => &[Self::Complete, Self::Aborted],
            Self::Complete | Self::Aborted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Successor on the non-aborting path, `None` for terminal states.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.allowed_next_states().first().copied()
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }

    /// Log bracket for sync stages; `None` for idle and terminal states.
    #[must_use]
    pub const fn markers(self) -> Option<StageMarkers> {
        let (start, complete, aborted) = match self {
            Self::StudentSync => (
                LogCode::StartingStudentImport,
                LogCode::StudentImportComplete,
                LogCode::StudentImportAborted,
            ),
            Self::AttendanceSync => (
                LogCode::StartingAttendanceImport,
                LogCode::AttendanceImportComplete,
                LogCode::AttendanceImportAborted,
            ),
            Self::ScheduleSync => (
                LogCode::StartingScheduleImport,
                LogCode::ScheduleImportComplete,
                LogCode::ScheduleImportAborted,
            ),
            Self::CourseSync => (
                LogCode::StartingCourseImport,
                LogCode::CourseImportComplete,
                LogCode::CourseImportAborted,
            ),
            Self::CourseAttendanceSync => (
                LogCode::StartingCourseAttendanceImport,
                LogCode::CourseAttendanceImportComplete,
                LogCode::CourseAttendanceImportAborted,
            ),
            Self::CommentSync => (
                LogCode::StartingGithubImport,
                LogCode::GithubImportComplete,
                LogCode::GithubImportAborted,
            ),
            Self::Idle | Self::Complete | Self::Aborted => return None,
        };
        Some(StageMarkers {
            start,
            complete,
            aborted,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StudentSync => "student_sync",
            Self::AttendanceSync => "attendance_sync",
            Self::ScheduleSync => "schedule_sync",
            Self::CourseSync => "course_sync",
            Self::CourseAttendanceSync => "course_attendance_sync",
            Self::CommentSync => "comment_sync",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CommentPhase
// ---------------------------------------------------------------------------

/// Phase of the comment backfill stage.
///
/// ```text
/// idle → fetching → complete (nothing missing)
///                 → bulk_import → level_passes → rename_reconciliation
///                               → sentinel_fill → complete
/// bulk_import | level_passes | rename_reconciliation → aborted (rate limited)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentPhase {
    Idle,
    Fetching,
    BulkImport,
    LevelPasses,
    RenameReconciliation,
    SentinelFill,
    Complete,
    Aborted,
}

impl CommentPhase {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::Fetching],
            Self::Fetching => &[Self::BulkImport, Self::Complete],
            Self::BulkImport => &[Self::LevelPasses, Self::Aborted],
            Self::LevelPasses => &[Self::RenameReconciliation, Self::Aborted],
            Self::RenameReconciliation => &[Self::SentinelFill, Self::Aborted],
            Self::SentinelFill => &[Self::Complete],
            Self::Complete | Self::Aborted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::BulkImport => "bulk_import",
            Self::LevelPasses => "level_passes",
            Self::RenameReconciliation => "rename_reconciliation",
            Self::SentinelFill => "sentinel_fill",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CommentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
