//! Entry points for the `tracker` subcommands.
//!
//! Each opens the store, runs one job, closes the store, and returns the
//! local start and end times of the run. Failures never change the return
//! value; they are in the log trail and the process log.

use std::fmt;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use tracker_config::TrackerConfig;
use tracker_core::DateWindow;
use tracker_core::window::{local_stamp, local_today};
use tracker_db::{RetryConfig, TrackerStore};
use tracker_sources::{GithubClient, Pike13Client, SalesforceClient};

use crate::crm_export::CrmExportEngine;
use crate::error::EngineError;
use crate::import::ImportEngine;

/// Local start and end times of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    pub started: String,
    pub finished: String,
}

impl RunStamp {
    #[must_use]
    pub fn new(tz: Tz, started: DateTime<Utc>, finished: DateTime<Utc>) -> Self {
        Self {
            started: local_stamp(tz, started),
            finished: local_stamp(tz, finished),
        }
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Start: {}, End: {}", self.started, self.finished)
    }
}

/// Run the nightly import.
pub async fn import(config: &TrackerConfig, tz: Tz) -> RunStamp {
    let started = Utc::now();
    if let Err(e) = run_import(config, tz, started).await {
        tracing::error!(error = %e, "import failed");
    }
    RunStamp::new(tz, started, Utc::now())
}

async fn run_import(
    config: &TrackerConfig,
    tz: Tz,
    started: DateTime<Utc>,
) -> Result<(), EngineError> {
    config.require_import()?;
    let scheduling = Pike13Client::new(&config.scheduling, tz)?;
    let comments = GithubClient::new(&config.code_host)?;

    let store = TrackerStore::connect(&config.database).await?;
    let report = ImportEngine::new(&store, &config.import, tz, started)
        .run(&scheduling, &comments)
        .await;
    store.close();

    tracing::info!(
        stage = %report.final_stage,
        stages = report.stages.len(),
        pruned = report.pruned,
        "import report"
    );
    Ok(())
}

/// Export the configured window of tracker data to the CRM.
pub async fn crm_export(config: &TrackerConfig, tz: Tz) -> RunStamp {
    let started = Utc::now();
    if let Err(e) = run_crm_export(config, tz, started).await {
        tracing::error!(error = %e, "crm export failed");
    }
    RunStamp::new(tz, started, Utc::now())
}

async fn run_crm_export(
    config: &TrackerConfig,
    tz: Tz,
    started: DateTime<Utc>,
) -> Result<(), EngineError> {
    config.require_crm_export()?;
    let sink = SalesforceClient::new(&config.crm, tz)?;
    let window = DateWindow::around(
        local_today(tz, started),
        config.crm_export.past_days,
        config.crm_export.future_days,
    );

    let store = TrackerStore::connect(&config.database).await?;
    let result = CrmExportEngine::new(&store, RetryConfig::attempts(config.crm.connect_attempts))
        .run(&sink, &window)
        .await;
    store.close();

    let report = result?;
    tracing::info!(
        connected = report.connected,
        complete = report.is_complete(),
        "crm export report"
    );
    Ok(())
}

/// Prune the log trail outside a full import.
pub async fn prune_logs(config: &TrackerConfig, tz: Tz, retention_days: Option<u32>) -> RunStamp {
    let started = Utc::now();
    if let Err(e) = run_prune_logs(config, tz, started, retention_days).await {
        tracing::error!(error = %e, "log pruning failed");
    }
    RunStamp::new(tz, started, Utc::now())
}

async fn run_prune_logs(
    config: &TrackerConfig,
    tz: Tz,
    started: DateTime<Utc>,
    retention_days: Option<u32>,
) -> Result<(), EngineError> {
    let days = retention_days.unwrap_or(config.import.log_retention_days);
    let store = TrackerStore::connect(&config.database).await?;
    let result = ImportEngine::new(&store, &config.import, tz, started)
        .remove_old_log_data(days)
        .await;
    store.close();
    let removed = result?;
    tracing::info!(removed, days, "log trail pruned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stamp_uses_local_time() {
        let started = Utc.with_ymd_and_hms(2024, 3, 6, 3, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2024, 3, 6, 3, 4, 10).unwrap();
        let stamp = RunStamp::new(chrono_tz::America::Los_Angeles, started, finished);
        assert_eq!(
            stamp.to_string(),
            "Start: 2024-03-05 19:00:00, End: 2024-03-05 19:04:10"
        );
    }
}
