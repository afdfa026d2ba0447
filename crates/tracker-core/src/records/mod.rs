//! Record models for everything the import reads from a source or writes to
//! the tracker database.
//!
//! Each record maps to one table of the tracker schema. Fields owned by the
//! external service are compared during reconciliation; fields derived by the
//! store (flags, comment state) are not.

mod attendance;
mod course;
mod log;
mod schedule;
mod student;

pub use attendance::{AttendanceEvent, CommentState, level_from_service_name};
pub use course::{CourseRecord, CourseSession};
pub use log::{LogEntry, LogSubject};
pub use schedule::ScheduleEntry;
pub use student::StudentRecord;

/// Outcome counts of one reconciliation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl UpsertSummary {
    /// Number of rows written (inserted or updated).
    #[must_use]
    pub const fn written(&self) -> usize {
        self.inserted + self.updated
    }

    /// Fold another batch's counts into this one.
    pub const fn merge(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }
}

impl std::fmt::Display for UpsertSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} unchanged",
            self.inserted, self.updated, self.unchanged
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        Ok(())
    }
}
