//! The domain log trail.
//!
//! Every start, completion, abort, and skipped record of a run is appended to
//! the `log_data` table as a coded entry. Each entry is mirrored into
//! `tracing` so the process log and the stored trail agree.

use chrono::Utc;

use tracker_core::enums::LogCode;
use tracker_core::records::LogEntry;
use tracker_db::TrackerStore;
use tracker_db::error::DatabaseError;

pub struct RunLogger<'a> {
    store: &'a TrackerStore,
}

impl<'a> RunLogger<'a> {
    #[must_use]
    pub const fn new(store: &'a TrackerStore) -> Self {
        Self { store }
    }

    /// Append an entry with no subject student.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entry cannot be stored.
    pub async fn log(&self, code: LogCode, detail: impl Into<String>) -> Result<(), DatabaseError> {
        self.append(LogEntry::new(code, detail, Utc::now())).await
    }

    /// Append an entry about one student.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the entry cannot be stored.
    pub async fn log_for(
        &self,
        code: LogCode,
        client_id: i64,
        name: &str,
        detail: impl Into<String>,
    ) -> Result<(), DatabaseError> {
        self.append(LogEntry::new(code, detail, Utc::now()).with_subject(client_id, name))
            .await
    }

    /// Like [`Self::log`], for paths that are already failing. A storage
    /// error is reported to `tracing` and otherwise dropped.
    pub async fn log_best_effort(&self, code: LogCode, detail: impl Into<String>) {
        if let Err(e) = self.log(code, detail).await {
            tracing::error!(code = %code, error = %e, "failed to store log entry");
        }
    }

    async fn append(&self, entry: LogEntry) -> Result<(), DatabaseError> {
        mirror(&entry);
        self.store.insert_log(&entry).await?;
        Ok(())
    }
}

fn mirror(entry: &LogEntry) {
    let message = entry.message();
    match entry.code {
        LogCode::CrmConnectionError | LogCode::CrmExportError | LogCode::ImportAborted => {
            tracing::error!(code = entry.code.code(), "{message}");
        }
        LogCode::LocationNotFound => tracing::warn!(code = entry.code.code(), "{message}"),
        code if code.is_abort() => tracing::warn!(code = code.code(), "{message}"),
        _ => tracing::info!(code = entry.code.code(), "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn entries_are_appended_in_order() {
        let store = TrackerStore::open_local(":memory:").await.unwrap();
        let log = RunLogger::new(&store);

        log.log(LogCode::StartingStudentImport, " for 2024-03-05 ***")
            .await
            .unwrap();
        log.log_for(LogCode::LocationNotFound, 101, "Ada Lovelace", ": location 7 ***")
            .await
            .unwrap();
        log.log_best_effort(LogCode::StudentImportComplete, " for 2024-03-05 ***")
            .await;

        let entries = store.query_logs().await.unwrap();
        let codes: Vec<_> = entries.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                LogCode::StartingStudentImport,
                LogCode::LocationNotFound,
                LogCode::StudentImportComplete,
            ]
        );
        assert_eq!(entries[1].subject.as_ref().unwrap().client_id, 101);
        assert_eq!(
            entries[0].message(),
            "*** START Student import for 2024-03-05 ***"
        );
    }
}
