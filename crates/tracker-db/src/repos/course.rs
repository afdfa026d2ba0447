//! Course repository: course rows and their session sets.
//!
//! A fetch only sees the sessions inside the course window. Sessions dated
//! outside that window are history and survive every reconcile; only the
//! window's own sessions are replaced by the fetched set.

use tracker_core::DateWindow;
use tracker_core::records::{CourseRecord, CourseSession};

use crate::error::DatabaseError;
use crate::helpers::{format_date, get_opt_string, get_u32, parse_date};
use crate::repos::{RowChange, UpsertSummary};
use crate::service::TrackerStore;

const COURSE_COLUMNS: &str =
    "course_id, name, location_id, location_code, start_date, end_date, capacity, enrolled";

async fn select_course(
    conn: &libsql::Connection,
    course_id: i64,
) -> Result<Option<CourseRecord>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE course_id = ?1"),
            [course_id],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    let mut course = CourseRecord {
        course_id: row.get::<i64>(0)?,
        name: row.get::<String>(1)?,
        location_id: row.get::<i64>(2)?,
        location_code: get_opt_string(&row, 3)?,
        start_date: parse_date(&row.get::<String>(4)?)?,
        end_date: parse_date(&row.get::<String>(5)?)?,
        capacity: get_u32(&row, 6)?,
        enrolled: get_u32(&row, 7)?,
        sessions: Vec::new(),
    };

    let mut sessions = conn
        .query(
            "SELECT schedule_id, session_date FROM course_sessions
             WHERE course_id = ?1 ORDER BY schedule_id",
            [course_id],
        )
        .await?;
    while let Some(row) = sessions.next().await? {
        course.sessions.push(CourseSession {
            schedule_id: row.get::<i64>(0)?,
            date: parse_date(&row.get::<String>(1)?)?,
        });
    }
    Ok(Some(course))
}

/// The record to store: `fetched` plus whatever of `stored` lies outside
/// `window`.
fn merge_history(
    stored: Option<&CourseRecord>,
    fetched: &CourseRecord,
    window: &DateWindow,
) -> CourseRecord {
    let mut merged = fetched.clone();
    if let Some(stored) = stored {
        merged.sessions.extend(
            stored
                .sessions
                .iter()
                .filter(|s| !window.contains(s.date))
                .filter(|s| !fetched.sessions.iter().any(|f| f.schedule_id == s.schedule_id)),
        );
        if stored.start_date < window.start {
            merged.start_date = merged.start_date.min(stored.start_date);
        }
        if stored.end_date > window.end {
            merged.end_date = merged.end_date.max(stored.end_date);
        }
    }
    merged.sessions.sort_unstable();
    merged.sessions.dedup_by_key(|s| s.schedule_id);
    if let Some(first) = merged.sessions.iter().map(|s| s.date).min() {
        merged.start_date = merged.start_date.min(first);
    }
    if let Some(last) = merged.sessions.iter().map(|s| s.date).max() {
        merged.end_date = merged.end_date.max(last);
    }
    merged
}

async fn reconcile_course(
    conn: &libsql::Connection,
    fetched: &CourseRecord,
    window: &DateWindow,
) -> Result<RowChange, DatabaseError> {
    let location_code = fetched.location_code.as_deref().ok_or_else(|| {
        DatabaseError::InvalidState(format!(
            "course {} has no resolved location",
            fetched.course_id
        ))
    })?;

    let stored = select_course(conn, fetched.course_id).await?;
    let incoming = merge_history(stored.as_ref(), fetched, window);
    let sql = match stored {
        Some(ref stored) if *stored == incoming => return Ok(RowChange::Unchanged),
        Some(_) => {
            "UPDATE courses SET name = ?2, location_id = ?3, location_code = ?4, start_date = ?5,
                    end_date = ?6, capacity = ?7, enrolled = ?8, updated_at = datetime('now')
             WHERE course_id = ?1"
        }
        None => {
            "INSERT INTO courses (course_id, name, location_id, location_code, start_date,
                                  end_date, capacity, enrolled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        }
    };

    conn.execute(
        sql,
        libsql::params![
            incoming.course_id,
            incoming.name.as_str(),
            incoming.location_id,
            location_code,
            format_date(incoming.start_date),
            format_date(incoming.end_date),
            i64::from(incoming.capacity),
            i64::from(incoming.enrolled)
        ],
    )
    .await?;

    conn.execute(
        "DELETE FROM course_sessions WHERE course_id = ?1",
        [incoming.course_id],
    )
    .await?;
    for session in &incoming.sessions {
        conn.execute(
            "INSERT INTO course_sessions (course_id, schedule_id, session_date)
             VALUES (?1, ?2, ?3)",
            libsql::params![
                incoming.course_id,
                session.schedule_id,
                format_date(session.date)
            ],
        )
        .await?;
    }

    Ok(if stored.is_some() {
        RowChange::Updated
    } else {
        RowChange::Inserted
    })
}

impl TrackerStore {
    /// Reconcile a batch of courses fetched for `window`, keyed by
    /// `course_id`. Each course's sessions inside `window` are replaced by
    /// the fetched ones; sessions outside it are kept.
    pub async fn upsert_courses(
        &self,
        courses: &[CourseRecord],
        window: &DateWindow,
    ) -> Result<UpsertSummary, DatabaseError> {
        let mut summary = UpsertSummary::default();
        if courses.is_empty() {
            return Ok(summary);
        }

        let tx = self.db().conn().transaction().await?;
        for course in courses {
            reconcile_course(&tx, course, window).await?.tally(&mut summary);
        }
        tx.commit().await?;

        tracing::debug!(%summary, "courses reconciled");
        Ok(summary)
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Option<CourseRecord>, DatabaseError> {
        select_course(self.db().conn(), course_id).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tracker_core::DateWindow;
    use tracker_core::records::{CourseRecord, CourseSession};

    use crate::test_support::helpers::{day, test_store};

    fn course(sessions: &[(i64, &str)]) -> CourseRecord {
        let sessions: Vec<CourseSession> = sessions
            .iter()
            .map(|&(schedule_id, date)| CourseSession {
                schedule_id,
                date: day(date),
            })
            .collect();
        CourseRecord {
            course_id: 9,
            name: "Spring Python Course".into(),
            location_id: 10,
            location_code: Some("CP".into()),
            start_date: sessions.iter().map(|s| s.date).min().unwrap(),
            end_date: sessions.iter().map(|s| s.date).max().unwrap(),
            capacity: 12,
            enrolled: 9,
            sessions,
        }
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(day(start), day(end)).unwrap()
    }

    #[tokio::test]
    async fn session_order_does_not_count_as_change() {
        let store = test_store().await;
        let spring = window("2024-02-11", "2024-04-26");
        let sessions = [(3, "2024-03-08"), (1, "2024-02-15"), (2, "2024-03-01")];
        store.upsert_courses(&[course(&sessions)], &spring).await.unwrap();

        let mut sorted = sessions;
        sorted.sort_unstable();
        let again = store.upsert_courses(&[course(&sorted)], &spring).await.unwrap();
        assert_eq!(again.unchanged, 1);
        assert_eq!(
            store.get_course(9).await.unwrap().unwrap().session_ids(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn sessions_inside_the_window_are_replaced() {
        let store = test_store().await;
        let spring = window("2024-02-11", "2024-04-26");
        store
            .upsert_courses(
                &[course(&[(1, "2024-02-15"), (2, "2024-03-01"), (3, "2024-03-08")])],
                &spring,
            )
            .await
            .unwrap();

        let summary = store
            .upsert_courses(&[course(&[(2, "2024-03-01"), (4, "2024-03-15")])], &spring)
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);
        let stored = store.get_course(9).await.unwrap().unwrap();
        assert_eq!(stored.session_ids(), vec![2, 4]);
        assert_eq!(stored.start_date, day("2024-03-01"));
        assert_eq!(stored.end_date, day("2024-03-15"));
    }

    #[tokio::test]
    async fn history_before_a_moved_window_is_kept() {
        let store = test_store().await;
        store
            .upsert_courses(
                &[course(&[(1, "2024-02-15"), (2, "2024-03-01"), (3, "2024-03-08")])],
                &window("2024-02-11", "2024-04-26"),
            )
            .await
            .unwrap();

        // A later run no longer sees the first session.
        let later = window("2024-02-19", "2024-05-04");
        let summary = store
            .upsert_courses(&[course(&[(2, "2024-03-01"), (3, "2024-03-08")])], &later)
            .await
            .unwrap();
        assert_eq!(summary.unchanged, 1);

        let stored = store.get_course(9).await.unwrap().unwrap();
        assert_eq!(stored.session_ids(), vec![1, 2, 3]);
        assert_eq!(stored.start_date, day("2024-02-15"));
        assert_eq!(stored.end_date, day("2024-03-08"));
    }

    #[tokio::test]
    async fn new_sessions_extend_a_course_with_history() {
        let store = test_store().await;
        store
            .upsert_courses(
                &[course(&[(1, "2024-02-15"), (2, "2024-03-01")])],
                &window("2024-02-11", "2024-04-26"),
            )
            .await
            .unwrap();

        let later = window("2024-02-19", "2024-05-04");
        store
            .upsert_courses(&[course(&[(2, "2024-03-01"), (5, "2024-05-02")])], &later)
            .await
            .unwrap();

        let stored = store.get_course(9).await.unwrap().unwrap();
        assert_eq!(stored.session_ids(), vec![1, 2, 5]);
        assert_eq!(stored.start_date, day("2024-02-15"));
        assert_eq!(stored.end_date, day("2024-05-02"));
    }
}
