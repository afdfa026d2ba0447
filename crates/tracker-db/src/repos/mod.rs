//! Repository methods on [`TrackerStore`](crate::service::TrackerStore), one
//! module per table group.
//!
//! Every `upsert_*` method reconciles one batch inside one transaction: each
//! record is looked up by its external ID, compared field by field, and then
//! inserted, updated, or left alone.

pub mod attendance;
pub mod course;
pub mod location;
pub mod log;
pub mod schedule;
pub mod student;

pub use tracker_core::records::UpsertSummary;

/// Outcome of reconciling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowChange {
    Inserted,
    Updated,
    Unchanged,
}

impl RowChange {
    pub(crate) const fn tally(self, summary: &mut UpsertSummary) {
        match self {
            Self::Inserted => summary.inserted += 1,
            Self::Updated => summary.updated += 1,
            Self::Unchanged => summary.unchanged += 1,
        }
    }
}
