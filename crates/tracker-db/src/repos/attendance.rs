//! Attendance repository: reconciliation and the comment backfill columns.
//!
//! Re-importing an event never touches `comment_state`, `comment`, or
//! `repo_name`. Those change only through [`TrackerStore::record_comment`] and
//! [`TrackerStore::mark_comment_processed`], and only while the event is still
//! missing its comment.

use chrono::NaiveDate;

use tracker_core::DateWindow;
use tracker_core::records::{AttendanceEvent, CommentState};

use crate::error::DatabaseError;
use crate::helpers::{
    format_date, format_local_datetime, get_opt_string, get_opt_u8, parse_enum,
    parse_local_datetime,
};
use crate::repos::{RowChange, UpsertSummary};
use crate::service::TrackerStore;

const ATTENDANCE_COLUMNS: &str = "client_id, visit_id, service_name, event_name, course_id, starts_at,
     status, level, comment_state, comment, repo_name";

fn row_to_event(row: &libsql::Row) -> Result<AttendanceEvent, DatabaseError> {
    let comment = match row.get::<String>(8)?.as_str() {
        "missing" => CommentState::Missing,
        "processed" => CommentState::Processed,
        "authored" => CommentState::Authored {
            text: get_opt_string(row, 9)?.unwrap_or_default(),
            repo: get_opt_string(row, 10)?,
        },
        other => {
            return Err(DatabaseError::InvalidState(format!(
                "unknown comment_state '{other}'"
            )));
        }
    };
    Ok(AttendanceEvent {
        client_id: row.get::<i64>(0)?,
        visit_id: row.get::<i64>(1)?,
        service_name: row.get::<String>(2)?,
        event_name: row.get::<String>(3)?,
        course_id: row.get::<Option<i64>>(4)?,
        starts_at: parse_local_datetime(&row.get::<String>(5)?)?,
        status: parse_enum(&row.get::<String>(6)?)?,
        level: get_opt_u8(row, 7)?,
        comment,
    })
}

async fn select_event(
    conn: &libsql::Connection,
    client_id: i64,
    visit_id: i64,
) -> Result<Option<AttendanceEvent>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE client_id = ?1 AND visit_id = ?2"
            ),
            libsql::params![client_id, visit_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_event(&row)?)),
        None => Ok(None),
    }
}

async fn reconcile_event(
    conn: &libsql::Connection,
    fetched: &AttendanceEvent,
) -> Result<RowChange, DatabaseError> {
    let stored = select_event(conn, fetched.client_id, fetched.visit_id).await?;
    let sql = match stored {
        Some(ref stored) if stored.same_source_fields(fetched) => {
            return Ok(RowChange::Unchanged);
        }
        Some(_) => {
            "UPDATE attendance SET service_name = ?3, event_name = ?4, course_id = ?5,
                    starts_at = ?6, service_date = ?7, status = ?8, level = ?9,
                    updated_at = datetime('now')
             WHERE client_id = ?1 AND visit_id = ?2"
        }
        None => {
            "INSERT INTO attendance (client_id, visit_id, service_name, event_name, course_id,
                                     starts_at, service_date, status, level)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        }
    };

    conn.execute(
        sql,
        libsql::params![
            fetched.client_id,
            fetched.visit_id,
            fetched.service_name.as_str(),
            fetched.event_name.as_str(),
            fetched.course_id,
            format_local_datetime(fetched.starts_at),
            format_date(fetched.service_date()),
            fetched.status.as_str(),
            fetched.level.map(i64::from)
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
    /// Reconcile a batch of attendance events keyed by `(client_id, visit_id)`.
    pub async fn upsert_attendance(
        &self,
        events: &[AttendanceEvent],
    ) -> Result<UpsertSummary, DatabaseError> {
        let mut summary = UpsertSummary::default();
        if events.is_empty() {
            return Ok(summary);
        }

        let tx = self.db().conn().transaction().await?;
        for event in events {
            reconcile_event(&tx, event).await?.tally(&mut summary);
        }
        tx.commit().await?;

        tracing::debug!(%summary, "attendance reconciled");
        Ok(summary)
    }

    pub async fn get_attendance(
        &self,
        client_id: i64,
        visit_id: i64,
    ) -> Result<Option<AttendanceEvent>, DatabaseError> {
        select_event(self.db().conn(), client_id, visit_id).await
    }

    /// Leveled events on or after `since` whose comment was never checked,
    /// in start-time order.
    pub async fn query_missing_comments(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>, DatabaseError> {
        self.query_events(
            "WHERE comment_state = 'missing' AND level IS NOT NULL AND service_date >= ?1",
            vec![format_date(since).into()],
        )
        .await
    }

    /// Events whose service date falls inside `window`.
    pub async fn query_attendance_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<AttendanceEvent>, DatabaseError> {
        self.query_events(
            "WHERE service_date >= ?1 AND service_date <= ?2",
            vec![
                format_date(window.start).into(),
                format_date(window.end).into(),
            ],
        )
        .await
    }

    async fn query_events(
        &self,
        filter: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<AttendanceEvent>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!(
                    "SELECT {ATTENDANCE_COLUMNS} FROM attendance {filter}
                     ORDER BY starts_at, client_id, visit_id"
                ),
                params,
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_event(&row)?);
        }
        Ok(results)
    }

    /// Attach a code-review comment to an event still missing one.
    ///
    /// Returns `false` when the event already has a comment or sentinel.
    pub async fn record_comment(
        &self,
        client_id: i64,
        visit_id: i64,
        text: &str,
        repo: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE attendance SET comment_state = 'authored', comment = ?3, repo_name = ?4
                 WHERE client_id = ?1 AND visit_id = ?2 AND comment_state = 'missing'",
                libsql::params![client_id, visit_id, text, repo],
            )
            .await?;
        Ok(changed == 1)
    }

    /// Mark an event as checked with no comment found.
    ///
    /// Returns `false` when the event already has a comment or sentinel.
    pub async fn mark_comment_processed(
        &self,
        client_id: i64,
        visit_id: i64,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .conn()
            .execute(
                "UPDATE attendance SET comment_state = 'processed'
                 WHERE client_id = ?1 AND visit_id = ?2 AND comment_state = 'missing'",
                libsql::params![client_id, visit_id],
            )
            .await?;
        Ok(changed == 1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracker_core::DateWindow;
    use tracker_core::enums::AttendanceStatus;
    use tracker_core::records::CommentState;

    use crate::test_support::helpers::{at, day, event, test_store};

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let store = test_store().await;
        let batch = vec![
            event(1, 100, at("2024-03-04", "16:00:00")),
            event(1, 101, at("2024-03-11", "16:00:00")),
        ];
        let first = store.upsert_attendance(&batch).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = store.upsert_attendance(&batch).await.unwrap();
        assert_eq!((second.unchanged, second.written()), (2, 0));
    }

    #[tokio::test]
    async fn changed_status_overwrites_stored_value() {
        let store = test_store().await;
        let mut e = event(1, 100, at("2024-03-04", "16:00:00"));
        e.status = AttendanceStatus::Registered;
        store.upsert_attendance(&[e.clone()]).await.unwrap();

        e.status = AttendanceStatus::Completed;
        let summary = store.upsert_attendance(&[e]).await.unwrap();
        assert_eq!(summary.updated, 1);
        let stored = store.get_attendance(1, 100).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Completed);
    }

    #[tokio::test]
    async fn reimport_never_touches_comment() {
        let store = test_store().await;
        let mut e = event(1, 100, at("2024-03-04", "16:00:00"));
        store.upsert_attendance(&[e.clone()]).await.unwrap();
        assert!(store.record_comment(1, 100, "added loops", Some("level1-module2")).await.unwrap());

        e.event_name = "Java Level 1 (Mon)".into();
        store.upsert_attendance(&[e]).await.unwrap();

        let stored = store.get_attendance(1, 100).await.unwrap().unwrap();
        assert_eq!(stored.event_name, "Java Level 1 (Mon)");
        assert_eq!(
            stored.comment,
            CommentState::Authored {
                text: "added loops".into(),
                repo: Some("level1-module2".into())
            }
        );
    }

    #[tokio::test]
    async fn comment_never_overwritten() {
        let store = test_store().await;
        store
            .upsert_attendance(&[event(1, 100, at("2024-03-04", "16:00:00"))])
            .await
            .unwrap();
        assert!(store.mark_comment_processed(1, 100).await.unwrap());
        assert!(!store.record_comment(1, 100, "late", None).await.unwrap());
        assert!(!store.mark_comment_processed(1, 100).await.unwrap());
    }

    #[tokio::test]
    async fn missing_comment_query_excludes_sentinels_and_unleveled() {
        let store = test_store().await;
        let mut open_lab = event(2, 200, at("2024-03-05", "17:00:00"));
        open_lab.level = None;
        store
            .upsert_attendance(&[
                event(1, 100, at("2024-03-04", "16:00:00")),
                event(1, 101, at("2024-03-06", "16:00:00")),
                event(1, 90, at("2024-02-20", "16:00:00")),
                open_lab,
            ])
            .await
            .unwrap();
        store.mark_comment_processed(1, 101).await.unwrap();

        let pending = store.query_missing_comments(day("2024-03-01")).await.unwrap();
        assert_eq!(
            pending.iter().map(|e| e.visit_id).collect::<Vec<_>>(),
            vec![100]
        );
    }

    #[tokio::test]
    async fn window_query_is_inclusive() {
        let store = test_store().await;
        store
            .upsert_attendance(&[
                event(1, 1, at("2024-03-01", "09:00:00")),
                event(1, 2, at("2024-03-10", "23:30:00")),
                event(1, 3, at("2024-03-11", "00:00:00")),
            ])
            .await
            .unwrap();

        let window = DateWindow::new(day("2024-03-01"), day("2024-03-10")).unwrap();
        let events = store.query_attendance_in_window(&window).await.unwrap();
        assert_eq!(events.iter().map(|e| e.visit_id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
