//! The nightly import: one linear pass over every sync stage.
//!
//! ```text
//! idle → student_sync → attendance_sync → schedule_sync → course_sync
//!      → course_attendance_sync → comment_sync → complete
//! ```
//!
//! Each operation brackets its work with the stage's start and complete log
//! codes. A failure is logged with the stage's abort code and returned;
//! [`ImportEngine::run`] then either moves on to the next stage or, for a
//! connection failure, abandons the run.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use tracker_config::ImportConfig;
use tracker_core::enums::{ImportStage, LogCode, StageMarkers};
use tracker_core::location::{LocatedRecord, LookupMiss};
use tracker_core::records::{AttendanceEvent, StudentRecord, UpsertSummary};
use tracker_core::window::{days_before, local_today};
use tracker_core::{ActiveRoster, CoreError, DateWindow, LocationLookup};
use tracker_db::TrackerStore;
use tracker_sources::{CommentSource, SchedulingSource};

use crate::comments::{CommentBackfill, CommentBackfillReport};
use crate::error::EngineError;
use crate::run_log::RunLogger;

/// How one stage of a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Complete(UpsertSummary),
    Aborted(String),
}

/// What one import run did, stage by stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRunReport {
    pub stages: Vec<(ImportStage, StageOutcome)>,
    pub final_stage: ImportStage,
    pub pruned: u64,
    pub comments: Option<CommentBackfillReport>,
}

impl ImportRunReport {
    #[must_use]
    pub fn outcome(&self, stage: ImportStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }
}

pub struct ImportEngine<'a> {
    store: &'a TrackerStore,
    log: RunLogger<'a>,
    config: &'a ImportConfig,
    tz: Tz,
    now: DateTime<Utc>,
    today: NaiveDate,
    stage: ImportStage,
}

impl<'a> ImportEngine<'a> {
    /// An engine for a run starting at `now`. Every window is computed from
    /// the local date of `now` in `tz`.
    #[must_use]
    pub fn new(
        store: &'a TrackerStore,
        config: &'a ImportConfig,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            log: RunLogger::new(store),
            config,
            tz,
            now,
            today: local_today(tz, now),
            stage: ImportStage::Idle,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> ImportStage {
        self.stage
    }

    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    /// First day of the attendance and comment imports.
    #[must_use]
    pub fn import_start(&self) -> NaiveDate {
        days_before(self.today, self.config.attendance_past_days)
    }

    #[must_use]
    pub fn schedule_window(&self) -> DateWindow {
        DateWindow::around(
            self.today,
            self.config.schedule_past_days,
            self.config.schedule_future_days,
        )
    }

    #[must_use]
    pub fn course_window(&self) -> DateWindow {
        DateWindow::around(
            self.today,
            self.config.course_past_days,
            self.config.course_future_days,
        )
    }

    /// Course visits already held: the past part of the course window.
    #[must_use]
    pub fn course_attendance_window(&self) -> DateWindow {
        DateWindow::around(self.today, self.config.course_past_days, 0)
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Reconcile every client and return the active roster as stored.
    ///
    /// # Errors
    ///
    /// Returns the fetch or storage error after logging the stage abort.
    pub async fn import_students<S: SchedulingSource>(
        &self,
        source: &S,
    ) -> Result<ActiveRoster, EngineError> {
        self.student_stage(source).await.map(|(roster, _)| roster)
    }

    async fn student_stage<S: SchedulingSource>(
        &self,
        source: &S,
    ) -> Result<(ActiveRoster, UpsertSummary), EngineError> {
        let base = format!(" for {}", self.today);
        let markers = self.begin(ImportStage::StudentSync, &base).await?;
        let result = self.sync_students(source).await;
        self.finish(markers, &base, result).await
    }

    async fn sync_students<S: SchedulingSource>(
        &self,
        source: &S,
    ) -> Result<(ActiveRoster, UpsertSummary), EngineError> {
        let students = source.fetch_clients().await?;
        let summary = self.store.upsert_students(&students).await?;
        if !students.is_empty() {
            let ids: Vec<i64> = students.iter().map(|s| s.client_id).collect();
            let deactivated = self.store.deactivate_missing_students(&ids).await?;
            if deactivated > 0 {
                tracing::info!(deactivated, "students no longer active");
            }
        }
        let roster = ActiveRoster::from_students(self.store.query_active().await?);
        Ok((roster, summary))
    }

    /// Reconcile visits from `start_date` through today for roster students,
    /// then fetch the full history of new and returning students.
    ///
    /// Returns the roster with the new flags cleared.
    ///
    /// # Errors
    ///
    /// Returns the fetch or storage error after logging the stage abort.
    pub async fn import_attendance<S: SchedulingSource>(
        &self,
        start_date: NaiveDate,
        source: &S,
        roster: ActiveRoster,
    ) -> Result<ActiveRoster, EngineError> {
        self.attendance_stage(start_date, source, roster)
            .await
            .map(|(roster, _)| roster)
    }

    async fn attendance_stage<S: SchedulingSource>(
        &self,
        start_date: NaiveDate,
        source: &S,
        roster: ActiveRoster,
    ) -> Result<(ActiveRoster, UpsertSummary), EngineError> {
        let base = format!(" starting from {start_date}");
        let markers = self.begin(ImportStage::AttendanceSync, &base).await?;
        let result = self.sync_attendance(start_date, source, roster).await;
        self.finish(markers, &base, result).await
    }

    async fn sync_attendance<S: SchedulingSource>(
        &self,
        start_date: NaiveDate,
        source: &S,
        roster: ActiveRoster,
    ) -> Result<(ActiveRoster, UpsertSummary), EngineError> {
        let events = source.fetch_attendance(start_date).await?;
        let mut summary = self.store_roster_events(events, &roster).await?;

        let newcomers: Vec<StudentRecord> = roster.new_students().cloned().collect();
        if !newcomers.is_empty() {
            tracing::info!(students = newcomers.len(), "fetching history for new students");
            let history = source.fetch_missing_attendance(start_date, &newcomers).await?;
            summary.merge(self.store_roster_events(history, &roster).await?);

            let ids: Vec<i64> = newcomers.iter().map(|s| s.client_id).collect();
            self.store.clear_new_flags(&ids).await?;
        }

        Ok((roster.without_new_flags(), summary))
    }

    /// Reconcile class occurrences in the schedule window.
    ///
    /// # Errors
    ///
    /// Returns the fetch or storage error after logging the stage abort.
    pub async fn import_schedule<S: SchedulingSource>(
        &self,
        source: &S,
        lookup: &LocationLookup,
    ) -> Result<UpsertSummary, EngineError> {
        let window = self.schedule_window();
        let base = format!(" as of {}", window.start);
        let markers = self.begin(ImportStage::ScheduleSync, &base).await?;
        let result = self.sync_schedule(source, lookup, &window).await;
        self.finish(markers, &base, result).await.map(|((), summary)| summary)
    }

    async fn sync_schedule<S: SchedulingSource>(
        &self,
        source: &S,
        lookup: &LocationLookup,
        window: &DateWindow,
    ) -> Result<((), UpsertSummary), EngineError> {
        let entries = source.fetch_schedule(window).await?;
        let (entries, skipped) = self.resolve_locations(entries, lookup, "schedule").await?;
        let mut summary = self.store.upsert_schedule(&entries).await?;
        summary.skipped += skipped;
        Ok(((), summary))
    }

    /// Reconcile courses with sessions in the course window, each with its
    /// session set.
    ///
    /// # Errors
    ///
    /// Returns the fetch or storage error after logging the stage abort.
    pub async fn import_courses<S: SchedulingSource>(
        &self,
        source: &S,
        lookup: &LocationLookup,
    ) -> Result<UpsertSummary, EngineError> {
        let window = self.course_window();
        let base = format!(" from {} to {}", window.start, window.end);
        let markers = self.begin(ImportStage::CourseSync, &base).await?;
        let result = self.sync_courses(source, lookup, &window).await;
        self.finish(markers, &base, result).await.map(|((), summary)| summary)
    }

    async fn sync_courses<S: SchedulingSource>(
        &self,
        source: &S,
        lookup: &LocationLookup,
        window: &DateWindow,
    ) -> Result<((), UpsertSummary), EngineError> {
        let courses = source.fetch_courses(window).await?;
        let (courses, skipped) = self.resolve_locations(courses, lookup, "course").await?;
        let mut summary = self.store.upsert_courses(&courses, window).await?;
        summary.skipped += skipped;
        Ok(((), summary))
    }

    /// Reconcile course visits inside `window` for roster students.
    ///
    /// # Errors
    ///
    /// Returns the fetch or storage error after logging the stage abort.
    pub async fn import_course_attendance<S: SchedulingSource>(
        &self,
        window: &DateWindow,
        source: &S,
        roster: &ActiveRoster,
    ) -> Result<UpsertSummary, EngineError> {
        let base = format!(" from {} to {}", window.start, window.end);
        let markers = self.begin(ImportStage::CourseAttendanceSync, &base).await?;
        let result = match source.fetch_course_attendance(window).await {
            Ok(events) => self
                .store_roster_events(events, roster)
                .await
                .map(|summary| ((), summary)),
            Err(e) => Err(e.into()),
        };
        self.finish(markers, &base, result).await.map(|((), summary)| summary)
    }

    /// Attach code-review comments to events on or after `start_date`.
    ///
    /// A rate-limited backfill logs the stage abort and still returns its
    /// report.
    ///
    /// # Errors
    ///
    /// Returns any other fetch or storage error after logging the stage abort.
    pub async fn import_comments<C: CommentSource>(
        &self,
        start_date: NaiveDate,
        source: &C,
        roster: &ActiveRoster,
    ) -> Result<CommentBackfillReport, EngineError> {
        let base = format!(" starting from {start_date}");
        let markers = self.begin(ImportStage::CommentSync, &base).await?;

        let backfill =
            CommentBackfill::new(self.store, source, roster, self.tz, &self.config.comment_levels);
        match backfill.run(start_date).await {
            Ok(report) if report.is_aborted() => {
                self.log
                    .log(markers.aborted, ": Github API rate limit exceeded ***")
                    .await?;
                Ok(report)
            }
            Ok(report) => {
                let detail = format!(
                    "{base}: {} matched, {} renamed, {} without comment ***",
                    report.matched, report.renamed, report.sentinels
                );
                self.log.log(markers.complete, detail).await?;
                Ok(report)
            }
            Err(e) => {
                self.log
                    .log_best_effort(markers.aborted, format!("{base}: {e} ***"))
                    .await;
                Err(e)
            }
        }
    }

    /// Delete log entries older than `retention_days` before the run's start.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the delete or its log entry fails.
    pub async fn remove_old_log_data(&self, retention_days: u32) -> Result<u64, EngineError> {
        let removed = self
            .store
            .prune_logs_older_than(retention_days, self.now)
            .await?;
        self.log
            .log(
                LogCode::LogDataPruned,
                format!(": {removed} entries older than {retention_days} days ***"),
            )
            .await?;
        Ok(removed)
    }

    /// Run every stage in order.
    ///
    /// Never fails: a stage failure is recorded in the report, and a
    /// connection failure ends the run in [`ImportStage::Aborted`] after
    /// logging `IMPORT_ABORTED`.
    pub async fn run<S: SchedulingSource, C: CommentSource>(
        &mut self,
        scheduling: &S,
        comments: &C,
    ) -> ImportRunReport {
        let mut report = ImportRunReport {
            stages: Vec::new(),
            final_stage: ImportStage::Idle,
            pruned: 0,
            comments: None,
        };
        if let Err(e) = self.run_stages(scheduling, comments, &mut report).await {
            self.log
                .log_best_effort(LogCode::ImportAborted, format!(": {e} ***"))
                .await;
            self.stage = ImportStage::Aborted;
        }
        report.final_stage = self.stage;
        tracing::info!(stage = %self.stage, "import run finished");
        report
    }

    async fn run_stages<S: SchedulingSource, C: CommentSource>(
        &mut self,
        scheduling: &S,
        comments: &C,
        report: &mut ImportRunReport,
    ) -> Result<(), EngineError> {
        report.pruned = self
            .remove_old_log_data(self.config.log_retention_days)
            .await?;
        let lookup = self.store.load_location_lookup().await?;
        let start = self.import_start();

        self.advance(ImportStage::StudentSync)?;
        let roster = match self.student_stage(scheduling).await {
            Ok((roster, summary)) => {
                report.record(self.stage, StageOutcome::Complete(summary));
                roster
            }
            Err(e) => {
                stage_failed(report, self.stage, e)?;
                ActiveRoster::from_students(self.store.query_active().await?)
            }
        };

        self.advance(ImportStage::AttendanceSync)?;
        let roster = match self
            .attendance_stage(start, scheduling, roster.clone())
            .await
        {
            Ok((updated, summary)) => {
                report.record(self.stage, StageOutcome::Complete(summary));
                updated
            }
            Err(e) => {
                stage_failed(report, self.stage, e)?;
                roster
            }
        };

        self.advance(ImportStage::ScheduleSync)?;
        let outcome = self.import_schedule(scheduling, &lookup).await;
        report.settle(self.stage, outcome)?;

        self.advance(ImportStage::CourseSync)?;
        let outcome = self.import_courses(scheduling, &lookup).await;
        report.settle(self.stage, outcome)?;

        self.advance(ImportStage::CourseAttendanceSync)?;
        let window = self.course_attendance_window();
        let outcome = self
            .import_course_attendance(&window, scheduling, &roster)
            .await;
        report.settle(self.stage, outcome)?;

        self.advance(ImportStage::CommentSync)?;
        match self.import_comments(start, comments, &roster).await {
            Ok(backfill) => {
                let outcome = if backfill.is_aborted() {
                    StageOutcome::Aborted("rate limit exceeded".into())
                } else {
                    StageOutcome::Complete(UpsertSummary {
                        updated: backfill.matched + backfill.renamed + backfill.sentinels,
                        ..UpsertSummary::default()
                    })
                };
                report.record(self.stage, outcome);
                report.comments = Some(backfill);
            }
            Err(e) => stage_failed(report, self.stage, e)?,
        }

        self.advance(ImportStage::Complete)?;
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn advance(&mut self, next: ImportStage) -> Result<(), CoreError> {
        if !self.stage.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "import".into(),
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        tracing::info!(from = %self.stage, to = %next, "import stage");
        self.stage = next;
        Ok(())
    }

    async fn begin(&self, stage: ImportStage, base: &str) -> Result<StageMarkers, EngineError> {
        let markers = stage.markers().ok_or_else(|| CoreError::InvalidTransition {
            entity: "import".into(),
            from: self.stage.to_string(),
            to: stage.to_string(),
        })?;
        self.log.log(markers.start, format!("{base} ***")).await?;
        Ok(markers)
    }

    /// Log the end of a stage. On success the summary is appended to the
    /// complete entry; on failure the error goes into the abort entry.
    async fn finish<T>(
        &self,
        markers: StageMarkers,
        base: &str,
        result: Result<(T, UpsertSummary), EngineError>,
    ) -> Result<(T, UpsertSummary), EngineError> {
        match result {
            Ok((value, summary)) => {
                self.log
                    .log(markers.complete, format!("{base}: {summary} ***"))
                    .await?;
                Ok((value, summary))
            }
            Err(e) => {
                self.log
                    .log_best_effort(markers.aborted, format!("{base}: {e} ***"))
                    .await;
                Err(e)
            }
        }
    }

    /// Keep events of roster students and reconcile them. Dropped events are
    /// counted as skipped.
    async fn store_roster_events(
        &self,
        events: Vec<AttendanceEvent>,
        roster: &ActiveRoster,
    ) -> Result<UpsertSummary, EngineError> {
        let fetched = events.len();
        let events: Vec<_> = events
            .into_iter()
            .filter(|e| roster.contains(e.client_id))
            .collect();
        let mut summary = self.store.upsert_attendance(&events).await?;
        summary.skipped += fetched - events.len();
        Ok(summary)
    }

    /// Resolve location codes, logging `LOCATION_NOT_FOUND` for every record
    /// with an unknown location. Returns the resolved records and the number
    /// skipped.
    async fn resolve_locations<T: LocatedRecord>(
        &self,
        records: Vec<T>,
        lookup: &LocationLookup,
        kind: &str,
    ) -> Result<(Vec<T>, usize), EngineError> {
        let (resolved, misses) = lookup.resolve(records);
        for LookupMiss {
            record_id,
            location_id,
        } in &misses
        {
            self.log
                .log(
                    LogCode::LocationNotFound,
                    format!(": location {location_id} for {kind} {record_id} ***"),
                )
                .await?;
        }
        Ok((resolved, misses.len()))
    }
}

impl ImportRunReport {
    fn record(&mut self, stage: ImportStage, outcome: StageOutcome) {
        self.stages.push((stage, outcome));
    }

    fn settle(
        &mut self,
        stage: ImportStage,
        outcome: Result<UpsertSummary, EngineError>,
    ) -> Result<(), EngineError> {
        match outcome {
            Ok(summary) => {
                self.record(stage, StageOutcome::Complete(summary));
                Ok(())
            }
            Err(e) => stage_failed(self, stage, e),
        }
    }
}

/// Record a stage failure. Connection failures are handed back to end the
/// run.
fn stage_failed(
    report: &mut ImportRunReport,
    stage: ImportStage,
    error: EngineError,
) -> Result<(), EngineError> {
    if error.scope().aborts_run() {
        return Err(error);
    }
    tracing::warn!(%stage, error = %error, "stage aborted, continuing");
    report.record(stage, StageOutcome::Aborted(error.to_string()));
    Ok(())
}
