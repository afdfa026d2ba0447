//! Schedule repository.
//!
//! Rows are refreshed for the fetched window only; occurrences outside it
//! are never deleted.

use tracker_core::DateWindow;
use tracker_core::records::ScheduleEntry;

use crate::error::DatabaseError;
use crate::helpers::{
    format_date, format_local_datetime, get_opt_string, get_u32, parse_local_datetime,
};
use crate::repos::{RowChange, UpsertSummary};
use crate::service::TrackerStore;

const SCHEDULE_COLUMNS: &str =
    "schedule_id, service_name, location_id, location_code, starts_at, ends_at, capacity, enrolled";

fn row_to_entry(row: &libsql::Row) -> Result<ScheduleEntry, DatabaseError> {
    Ok(ScheduleEntry {
        schedule_id: row.get::<i64>(0)?,
        service_name: row.get::<String>(1)?,
        location_id: row.get::<i64>(2)?,
        location_code: get_opt_string(row, 3)?,
        starts_at: parse_local_datetime(&row.get::<String>(4)?)?,
        ends_at: parse_local_datetime(&row.get::<String>(5)?)?,
        capacity: get_u32(row, 6)?,
        enrolled: get_u32(row, 7)?,
    })
}

async fn select_entry(
    conn: &libsql::Connection,
    schedule_id: i64,
) -> Result<Option<ScheduleEntry>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM schedule WHERE schedule_id = ?1"),
            [schedule_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_entry(&row)?)),
        None => Ok(None),
    }
}

async fn reconcile_entry(
    conn: &libsql::Connection,
    fetched: &ScheduleEntry,
) -> Result<RowChange, DatabaseError> {
    let location_code = fetched.location_code.as_deref().ok_or_else(|| {
        DatabaseError::InvalidState(format!(
            "schedule {} has no resolved location",
            fetched.schedule_id
        ))
    })?;

    let stored = select_entry(conn, fetched.schedule_id).await?;
    let sql = match stored {
        Some(ref stored) if stored == fetched => return Ok(RowChange::Unchanged),
        Some(_) => {
            "UPDATE schedule SET service_name = ?2, location_id = ?3, location_code = ?4,
                    starts_at = ?5, ends_at = ?6, capacity = ?7, enrolled = ?8,
                    updated_at = datetime('now')
             WHERE schedule_id = ?1"
        }
        None => {
            "INSERT INTO schedule (schedule_id, service_name, location_id, location_code,
                                   starts_at, ends_at, capacity, enrolled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        }
    };

    conn.execute(
        sql,
        libsql::params![
            fetched.schedule_id,
            fetched.service_name.as_str(),
            fetched.location_id,
            location_code,
            format_local_datetime(fetched.starts_at),
            format_local_datetime(fetched.ends_at),
            i64::from(fetched.capacity),
            i64::from(fetched.enrolled)
        ],
    )
    .await?;
    Ok(if stored.is_some() {
        RowChange::Updated
    } else {
        RowChange::Inserted
    })
}

impl TrackerStore {
    /// Reconcile a batch of schedule occurrences keyed by `schedule_id`.
    ///
    /// Every entry must carry a resolved `location_code`.
    pub async fn upsert_schedule(
        &self,
        entries: &[ScheduleEntry],
    ) -> Result<UpsertSummary, DatabaseError> {
        let mut summary = UpsertSummary::default();
        if entries.is_empty() {
            return Ok(summary);
        }

        let tx = self.db().conn().transaction().await?;
        for entry in entries {
            reconcile_entry(&tx, entry).await?.tally(&mut summary);
        }
        tx.commit().await?;

        tracing::debug!(%summary, "schedule reconciled");
        Ok(summary)
    }

    pub async fn get_schedule(&self, schedule_id: i64) -> Result<Option<ScheduleEntry>, DatabaseError> {
        select_entry(self.db().conn(), schedule_id).await
    }

    /// Occurrences starting on a date inside `window`, in start-time order.
    pub async fn query_schedule_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<ScheduleEntry>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM schedule
                     WHERE date(starts_at) >= ?1 AND date(starts_at) <= ?2
                     ORDER BY starts_at, schedule_id"
                ),
                libsql::params![format_date(window.start), format_date(window.end)],
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_entry(&row)?);
        }
        Ok(results)
    }
}
