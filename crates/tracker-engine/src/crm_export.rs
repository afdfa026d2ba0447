//! Export of tracker data to the CRM.
//!
//! Stages run in dependency order (contacts, then attendance and schedule
//! rows that reference them). The first failing stage ends the export.

use std::fmt;

use tracker_core::DateWindow;
use tracker_core::enums::LogCode;
use tracker_db::{RetryConfig, TrackerStore, with_retry};
use tracker_sources::CrmSink;

use crate::error::EngineError;
use crate::run_log::RunLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmExportStage {
    Contacts,
    Attendance,
    Schedule,
}

impl CrmExportStage {
    pub const ALL: [Self; 3] = [Self::Contacts, Self::Attendance, Self::Schedule];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Attendance => "attendance",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for CrmExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmExportReport {
    pub window: DateWindow,
    pub connected: bool,
    /// Records the CRM accepted, per finished stage.
    pub exported: Vec<(CrmExportStage, usize)>,
    pub failed_stage: Option<CrmExportStage>,
}

impl CrmExportReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.connected && self.failed_stage.is_none()
    }
}

pub struct CrmExportEngine<'a> {
    store: &'a TrackerStore,
    log: RunLogger<'a>,
    retry: RetryConfig,
}

impl<'a> CrmExportEngine<'a> {
    #[must_use]
    pub const fn new(store: &'a TrackerStore, retry: RetryConfig) -> Self {
        Self {
            store,
            log: RunLogger::new(store),
            retry,
        }
    }

    /// Export the tracker's students and the attendance and schedule inside
    /// `window`.
    ///
    /// Connect and stage failures are logged and reported, not returned.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the tracker store cannot be read or the log
    /// trail cannot be written.
    pub async fn run<K: CrmSink>(
        &self,
        sink: &K,
        window: &DateWindow,
    ) -> Result<CrmExportReport, EngineError> {
        let bracket = format!(" from {} to {} ***", window.start, window.end);
        self.log.log(LogCode::StartingCrmExport, bracket.as_str()).await?;

        let mut report = CrmExportReport {
            window: *window,
            connected: false,
            exported: Vec::new(),
            failed_stage: None,
        };

        let connected = with_retry(&self.retry, move |attempt| {
            tracing::debug!(attempt, "connecting to crm");
            sink.connect()
        })
        .await;
        if let Err(e) = connected {
            sink.disconnect().await;
            self.log
                .log(LogCode::CrmConnectionError, format!(": {e}"))
                .await?;
            self.log.log(LogCode::CrmExportAborted, bracket).await?;
            return Ok(report);
        }
        report.connected = true;

        let exported = self.export_stages(sink, window, &mut report).await;
        sink.disconnect().await;

        match exported {
            Ok(()) if report.failed_stage.is_none() => {
                self.log.log(LogCode::CrmExportComplete, bracket).await?;
                Ok(report)
            }
            Ok(()) => {
                self.log.log(LogCode::CrmExportAborted, bracket).await?;
                Ok(report)
            }
            Err(e) => {
                self.log
                    .log_best_effort(LogCode::CrmExportError, format!(": {e}"))
                    .await;
                self.log.log_best_effort(LogCode::CrmExportAborted, bracket).await;
                Err(e)
            }
        }
    }

    async fn export_stages<K: CrmSink>(
        &self,
        sink: &K,
        window: &DateWindow,
        report: &mut CrmExportReport,
    ) -> Result<(), EngineError> {
        for stage in CrmExportStage::ALL {
            let result = match stage {
                CrmExportStage::Contacts => {
                    let students = self.store.query_all_students().await?;
                    sink.upsert_contacts(&students).await
                }
                CrmExportStage::Attendance => {
                    let events = self.store.query_attendance_in_window(window).await?;
                    sink.upsert_attendance(&events).await
                }
                CrmExportStage::Schedule => {
                    let entries = self.store.query_schedule_in_window(window).await?;
                    sink.upsert_schedule(&entries).await
                }
            };

            match result {
                Ok(accepted) => {
                    tracing::info!(%stage, accepted, "crm stage exported");
                    report.exported.push((stage, accepted));
                }
                Err(e) => {
                    self.log
                        .log(LogCode::CrmExportError, format!(": {stage}: {e}"))
                        .await?;
                    report.failed_stage = Some(stage);
                    break;
                }
            }
        }
        Ok(())
    }
}
