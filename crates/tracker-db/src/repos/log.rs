//! Log trail repository. Append-only; rows are removed only by age.

use chrono::{DateTime, Duration, Utc};

use tracker_core::enums::LogCode;
use tracker_core::records::{LogEntry, LogSubject};

use crate::error::DatabaseError;
use crate::helpers::{format_utc, get_opt_string, parse_datetime};
use crate::service::TrackerStore;

fn row_to_log(row: &libsql::Row) -> Result<LogEntry, DatabaseError> {
    let code = row.get::<i64>(1)?;
    let subject = match (row.get::<Option<i64>>(2)?, get_opt_string(row, 3)?) {
        (Some(client_id), name) => Some(LogSubject {
            client_id,
            name: name.unwrap_or_default(),
        }),
        (None, _) => None,
    };
    Ok(LogEntry {
        id: Some(row.get::<i64>(0)?),
        code: LogCode::from_code(code)
            .ok_or_else(|| DatabaseError::InvalidState(format!("unknown log code {code}")))?,
        subject,
        detail: row.get::<String>(4)?,
        logged_at: parse_datetime(&row.get::<String>(5)?)?,
    })
}

impl TrackerStore {
    /// Append an entry and return its row ID.
    pub async fn insert_log(&self, entry: &LogEntry) -> Result<i64, DatabaseError> {
        let (client_id, name) = match &entry.subject {
            Some(subject) => (Some(subject.client_id), Some(subject.name.as_str())),
            None => (None, None),
        };
        self.db()
            .conn()
            .execute(
                "INSERT INTO log_data (code, client_id, student_name, detail, logged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![
                    entry.code.code(),
                    client_id,
                    name,
                    entry.detail.as_str(),
                    format_utc(entry.logged_at)
                ],
            )
            .await?;
        Ok(self.db().conn().last_insert_rowid())
    }

    /// Every entry in insertion order.
    pub async fn query_logs(&self) -> Result<Vec<LogEntry>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                "SELECT id, code, client_id, student_name, detail, logged_at
                 FROM log_data ORDER BY id",
                (),
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_log(&row)?);
        }
        Ok(results)
    }

    /// Delete entries logged more than `retention_days` before `now`.
    /// Returns the number of rows removed.
    pub async fn prune_logs_older_than(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(retention_days)))
        else {
            tracing::debug!(retention_days, "retention predates the earliest timestamp");
            return Ok(0);
        };
        let removed = self
            .db()
            .conn()
            .execute(
                "DELETE FROM log_data WHERE logged_at < ?1",
                [format_utc(cutoff)],
            )
            .await?;
        Ok(removed)
    }
}
