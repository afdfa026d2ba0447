//! Comment backfill: attach each student's commit messages to the attendance
//! events they were written for.
//!
//! Passes run in a fixed order, each narrowing the set of pending events:
//!
//! 1. bulk pass over the main organization
//! 2. one pass per configured class level, over that level's organization
//! 3. rename pass, searching under each renamed student's previous login
//! 4. sentinel fill, marking whatever is still pending as processed
//!
//! A rate-limited fetch ends the backfill where it is. Events not yet matched
//! stay `Missing` and are picked up again by the next run.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;

use tracker_core::enums::CommentPhase;
use tracker_core::records::AttendanceEvent;
use tracker_core::{ActiveRoster, CoreError};
use tracker_db::TrackerStore;
use tracker_db::error::DatabaseError;
use tracker_sources::{CodeComment, CommentScope, CommentSource, SourceError};

use crate::error::EngineError;

/// What one backfill did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBackfillReport {
    /// Every phase entered, in order, starting with `Idle`.
    pub phases: Vec<CommentPhase>,
    /// Events missing a comment when the backfill started.
    pub pending: usize,
    /// Events given a comment by the bulk and level passes.
    pub matched: usize,
    /// Events given a comment found under a previous login.
    pub renamed: usize,
    /// Events marked processed with no comment.
    pub sentinels: usize,
}

impl Default for CommentBackfillReport {
    fn default() -> Self {
        Self {
            phases: vec![CommentPhase::Idle],
            pending: 0,
            matched: 0,
            renamed: 0,
            sentinels: 0,
        }
    }
}

impl CommentBackfillReport {
    #[must_use]
    pub fn phase(&self) -> CommentPhase {
        self.phases.last().copied().unwrap_or(CommentPhase::Idle)
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.phase() == CommentPhase::Aborted
    }

    #[must_use]
    pub fn visited(&self, phase: CommentPhase) -> bool {
        self.phases.contains(&phase)
    }

    fn advance(&mut self, next: CommentPhase) -> Result<(), CoreError> {
        let current = self.phase();
        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "comment backfill".into(),
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %current, to = %next, "comment backfill phase");
        self.phases.push(next);
        Ok(())
    }
}

pub struct CommentBackfill<'a, C> {
    store: &'a TrackerStore,
    source: &'a C,
    roster: &'a ActiveRoster,
    tz: Tz,
    levels: &'a [u8],
}

impl<'a, C: CommentSource> CommentBackfill<'a, C> {
    #[must_use]
    pub const fn new(
        store: &'a TrackerStore,
        source: &'a C,
        roster: &'a ActiveRoster,
        tz: Tz,
        levels: &'a [u8],
    ) -> Self {
        Self {
            store,
            source,
            roster,
            tz,
            levels,
        }
    }

    /// Backfill comments for events on or after `since`.
    ///
    /// A rate limit is not an error: the report ends in
    /// [`CommentPhase::Aborted`].
    ///
    /// # Errors
    ///
    /// Returns the first storage error, or any source error other than a rate
    /// limit.
    pub async fn run(&self, since: NaiveDate) -> Result<CommentBackfillReport, EngineError> {
        let mut report = CommentBackfillReport::default();
        report.advance(CommentPhase::Fetching)?;

        let mut pending = self.store.query_missing_comments(since).await?;
        report.pending = pending.len();
        if pending.is_empty() {
            report.advance(CommentPhase::Complete)?;
            return Ok(report);
        }

        report.advance(CommentPhase::BulkImport)?;
        let Some(comments) = self
            .fetch(&mut report, self.source.fetch_comments(CommentScope::Organization, since))
            .await?
        else {
            return Ok(report);
        };
        report.matched += self
            .attach(&mut pending, &comments, |login| self.owner(login), |_| true)
            .await?;

        report.advance(CommentPhase::LevelPasses)?;
        for &level in self.levels {
            if !pending.iter().any(|e| e.level == Some(level)) {
                continue;
            }
            let Some(comments) = self
                .fetch(&mut report, self.source.fetch_comments(CommentScope::Level(level), since))
                .await?
            else {
                return Ok(report);
            };
            report.matched += self
                .attach(
                    &mut pending,
                    &comments,
                    |login| self.owner(login),
                    |e| e.level == Some(level),
                )
                .await?;
        }

        report.advance(CommentPhase::RenameReconciliation)?;
        for student in self.roster.renamed_students() {
            let Some(previous) = student.github_user_previous.as_deref() else {
                continue;
            };
            let Some(comments) = self
                .fetch(&mut report, self.source.fetch_user_comments(previous, since))
                .await?
            else {
                return Ok(report);
            };
            let client_id = student.client_id;
            report.renamed += self
                .attach(
                    &mut pending,
                    &comments,
                    |login| login.eq_ignore_ascii_case(previous).then_some(client_id),
                    |e| e.client_id == client_id,
                )
                .await?;
            self.store.clear_github_renamed(client_id).await?;
        }

        report.advance(CommentPhase::SentinelFill)?;
        for event in &pending {
            if self
                .store
                .mark_comment_processed(event.client_id, event.visit_id)
                .await?
            {
                report.sentinels += 1;
            }
        }

        report.advance(CommentPhase::Complete)?;
        Ok(report)
    }

    /// Await a fetch. `None` means the fetch was rate limited and the report
    /// has moved to `Aborted`.
    async fn fetch(
        &self,
        report: &mut CommentBackfillReport,
        request: impl Future<Output = Result<Vec<CodeComment>, SourceError>>,
    ) -> Result<Option<Vec<CodeComment>>, EngineError> {
        match request.await {
            Ok(comments) => Ok(Some(comments)),
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(phase = %report.phase(), error = %e, "comment backfill rate limited");
                report.advance(CommentPhase::Aborted)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn owner(&self, login: &str) -> Option<i64> {
        self.roster.by_github_login(login).map(|s| s.client_id)
    }

    /// Store the day's comments on every eligible pending event that has
    /// some, and drop those events from `pending`. Returns the number of
    /// events updated.
    async fn attach(
        &self,
        pending: &mut Vec<AttendanceEvent>,
        comments: &[CodeComment],
        owner: impl Fn(&str) -> Option<i64>,
        eligible: impl Fn(&AttendanceEvent) -> bool,
    ) -> Result<usize, DatabaseError> {
        let by_day = group_by_student_day(comments, self.tz, owner);
        if by_day.is_empty() {
            return Ok(0);
        }

        let mut attached = 0;
        let mut remaining = Vec::with_capacity(pending.len());
        for event in std::mem::take(pending) {
            let day = eligible(&event)
                .then(|| by_day.get(&(event.client_id, event.service_date())))
                .flatten();
            let Some(day) = day else {
                remaining.push(event);
                continue;
            };
            let text = day
                .iter()
                .map(|c| c.message.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let repo = day.first().map(|c| c.repo.as_str());
            if self
                .store
                .record_comment(event.client_id, event.visit_id, &text, repo)
                .await?
            {
                attached += 1;
            }
        }
        *pending = remaining;
        Ok(attached)
    }
}

/// Group comments by owning student and local commit date, each group in
/// commit order. Comments with no owner are dropped.
fn group_by_student_day<'c>(
    comments: &'c [CodeComment],
    tz: Tz,
    owner: impl Fn(&str) -> Option<i64>,
) -> BTreeMap<(i64, NaiveDate), Vec<&'c CodeComment>> {
    let mut by_day: BTreeMap<(i64, NaiveDate), Vec<&CodeComment>> = BTreeMap::new();
    for comment in comments {
        if let Some(client_id) = owner(&comment.author_login) {
            by_day
                .entry((client_id, comment.local_date(tz)))
                .or_default()
                .push(comment);
        }
    }
    for day in by_day.values_mut() {
        day.sort_by_key(|c| c.committed_at);
    }
    by_day
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn comment(login: &str, message: &str, utc: (u32, u32, u32)) -> CodeComment {
        CodeComment {
            author_login: login.into(),
            repo: format!("{message}-repo"),
            message: message.into(),
            committed_at: Utc
                .with_ymd_and_hms(2024, 3, utc.0, utc.1, utc.2, 0)
                .unwrap(),
        }
    }

    #[test]
    fn groups_by_local_day_in_commit_order() {
        let comments = vec![
            comment("ada", "second", (6, 1, 0)),
            comment("ada", "first", (5, 20, 0)),
            comment("ADA", "next day", (6, 18, 0)),
            comment("stranger", "ignored", (5, 20, 0)),
        ];
        let owner = |login: &str| login.eq_ignore_ascii_case("ada").then_some(101);
        let by_day = group_by_student_day(&comments, chrono_tz::America::Los_Angeles, owner);

        let march_5 = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let march_6 = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let messages: Vec<_> = by_day[&(101, march_5)].iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(by_day[&(101, march_6)].len(), 1);
        assert_eq!(by_day.len(), 2);
    }

    #[test]
    fn report_rejects_skipped_phases() {
        let mut report = CommentBackfillReport::default();
        assert!(report.advance(CommentPhase::SentinelFill).is_err());
        report.advance(CommentPhase::Fetching).unwrap();
        report.advance(CommentPhase::Complete).unwrap();
        assert_eq!(report.phase(), CommentPhase::Complete);
        assert!(!report.visited(CommentPhase::BulkImport));
    }
}
