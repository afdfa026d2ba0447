//! Student repository: reconciliation, roster queries, and flag maintenance.

use tracker_core::records::StudentRecord;

use crate::error::DatabaseError;
use crate::helpers::{format_date, get_bool, get_opt_string, get_opt_u8, parse_optional_date};
use crate::repos::{RowChange, UpsertSummary};
use crate::service::TrackerStore;

const STUDENT_COLUMNS: &str = "client_id, first_name, last_name, github_user, home_location, start_date,
     current_level, grade, active, is_new, is_returned, github_user_previous, github_renamed";

fn row_to_student(row: &libsql::Row) -> Result<StudentRecord, DatabaseError> {
    let start_date = get_opt_string(row, 5)?;
    Ok(StudentRecord {
        client_id: row.get::<i64>(0)?,
        first_name: row.get::<String>(1)?,
        last_name: row.get::<String>(2)?,
        github_user: get_opt_string(row, 3)?,
        home_location: get_opt_string(row, 4)?,
        start_date: parse_optional_date(start_date.as_deref())?,
        current_level: get_opt_u8(row, 6)?,
        grade: get_opt_u8(row, 7)?,
        active: get_bool(row, 8)?,
        is_new: get_bool(row, 9)?,
        is_returned: get_bool(row, 10)?,
        github_user_previous: get_opt_string(row, 11)?,
        github_renamed: get_bool(row, 12)?,
    })
}

async fn select_student(
    conn: &libsql::Connection,
    client_id: i64,
) -> Result<Option<StudentRecord>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE client_id = ?1"),
            [client_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_student(&row)?)),
        None => Ok(None),
    }
}

async fn reconcile_student(
    conn: &libsql::Connection,
    fetched: &StudentRecord,
) -> Result<RowChange, DatabaseError> {
    let Some(stored) = select_student(conn, fetched.client_id).await? else {
        conn.execute(
            "INSERT INTO students (client_id, first_name, last_name, github_user, home_location,
                                   start_date, current_level, grade, active, is_new)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
            libsql::params![
                fetched.client_id,
                fetched.first_name.as_str(),
                fetched.last_name.as_str(),
                fetched.github_user.as_deref(),
                fetched.home_location.as_deref(),
                fetched.start_date.map(format_date),
                fetched.current_level.map(i64::from),
                fetched.grade.map(i64::from),
                fetched.active
            ],
        )
        .await?;
        return Ok(RowChange::Inserted);
    };

    if stored.same_source_fields(fetched) {
        return Ok(RowChange::Unchanged);
    }

    let returned = stored.is_returned || (!stored.active && fetched.active);
    let (previous, renamed) = match stored.github_rename_to(fetched) {
        Some(old) => (Some(old), true),
        None => (stored.github_user_previous.clone(), stored.github_renamed),
    };

    conn.execute(
        "UPDATE students SET first_name = ?2, last_name = ?3, github_user = ?4, home_location = ?5,
                start_date = ?6, current_level = ?7, grade = ?8, active = ?9, is_returned = ?10,
                github_user_previous = ?11, github_renamed = ?12, updated_at = datetime('now')
         WHERE client_id = ?1",
        libsql::params![
            fetched.client_id,
            fetched.first_name.as_str(),
            fetched.last_name.as_str(),
            fetched.github_user.as_deref(),
            fetched.home_location.as_deref(),
            fetched.start_date.map(format_date),
            fetched.current_level.map(i64::from),
            fetched.grade.map(i64::from),
            fetched.active,
            returned,
            previous,
            renamed
        ],
    )
    .await?;
    Ok(RowChange::Updated)
}

impl TrackerStore {
    /// Reconcile a batch of fetched students keyed by `client_id`.
    ///
    /// Inserted students are flagged new. A student going from inactive to
    /// active is flagged returned. A changed non-empty code-host login is kept
    /// in `github_user_previous` and the student is flagged renamed.
    pub async fn upsert_students(
        &self,
        students: &[StudentRecord],
    ) -> Result<UpsertSummary, DatabaseError> {
        let mut summary = UpsertSummary::default();
        if students.is_empty() {
            return Ok(summary);
        }

        let tx = self.db().conn().transaction().await?;
        for student in students {
            reconcile_student(&tx, student).await?.tally(&mut summary);
        }
        tx.commit().await?;

        tracing::debug!(%summary, "students reconciled");
        Ok(summary)
    }

    /// Mark active students that are absent from a complete client fetch as
    /// inactive. Returns the number of students deactivated.
    pub async fn deactivate_missing_students(
        &self,
        fetched_ids: &[i64],
    ) -> Result<u64, DatabaseError> {
        if fetched_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = (1..=fetched_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let params: Vec<libsql::Value> = fetched_ids.iter().map(|&id| id.into()).collect();
        let removed = self
            .db()
            .conn()
            .execute(
                &format!(
                    "UPDATE students SET active = 0, updated_at = datetime('now')
                     WHERE active = 1 AND client_id NOT IN ({placeholders})"
                ),
                params,
            )
            .await?;
        Ok(removed)
    }

    pub async fn get_student(&self, client_id: i64) -> Result<Option<StudentRecord>, DatabaseError> {
        select_student(self.db().conn(), client_id).await
    }

    /// Every active student, ordered by `client_id`.
    pub async fn query_active(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        self.query_students("WHERE active = 1").await
    }

    /// Every student, active or not.
    pub async fn query_all_students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        self.query_students("").await
    }

    async fn query_students(&self, filter: &str) -> Result<Vec<StudentRecord>, DatabaseError> {
        let mut rows = self
            .db()
            .conn()
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM students {filter} ORDER BY client_id"),
                (),
            )
            .await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(row_to_student(&row)?);
        }
        Ok(results)
    }

    /// Clear the new and returned flags once a student's history is stored.
    pub async fn clear_new_flags(&self, client_ids: &[i64]) -> Result<u64, DatabaseError> {
        let mut cleared = 0;
        for &client_id in client_ids {
            cleared += self
                .db()
                .conn()
                .execute(
                    "UPDATE students SET is_new = 0, is_returned = 0
                     WHERE client_id = ?1 AND (is_new = 1 OR is_returned = 1)",
                    [client_id],
                )
                .await?;
        }
        Ok(cleared)
    }

    /// Clear the renamed flag once comments under the old login are matched.
    pub async fn clear_github_renamed(&self, client_id: i64) -> Result<(), DatabaseError> {
        self.db()
            .conn()
            .execute(
                "UPDATE students SET github_renamed = 0 WHERE client_id = ?1",
                [client_id],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::test_support::helpers::{day, student, test_store};

    #[tokio::test]
    async fn first_upsert_inserts_and_flags_new() {
        let store = test_store().await;
        let summary = store
            .upsert_students(&[student(1, "Ada", "Lovelace"), student(2, "Alan", "Turing")])
            .await
            .unwrap();
        assert_eq!((summary.inserted, summary.updated), (2, 0));

        let ada = store.get_student(1).await.unwrap().unwrap();
        assert!(ada.is_new);
        assert!(ada.active);
    }

    #[tokio::test]
    async fn second_identical_upsert_is_unchanged() {
        let store = test_store().await;
        let mut batch = vec![student(1, "Ada", "Lovelace"), student(2, "Alan", "Turing")];
        batch[0].start_date = Some(day("2023-09-01"));
        batch[0].current_level = Some(2);
        store.upsert_students(&batch).await.unwrap();

        let again = store.upsert_students(&batch).await.unwrap();
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.written(), 0);
    }

    #[tokio::test]
    async fn changed_names_update_in_place() {
        let store = test_store().await;
        store
            .upsert_students(&[student(1, "Ada", "Lovelace"), student(2, "Alan", "Turing")])
            .await
            .unwrap();

        let summary = store
            .upsert_students(&[
                student(1, "Ada", "King"),
                student(2, "Alan M.", "Turing"),
                student(3, "Grace", "Hopper"),
            ])
            .await
            .unwrap();
        assert_eq!((summary.inserted, summary.updated), (1, 2));
        assert_eq!(store.get_student(1).await.unwrap().unwrap().last_name, "King");
    }

    #[tokio::test]
    async fn reactivation_flags_returned() {
        let store = test_store().await;
        let mut s = student(5, "Katherine", "Johnson");
        s.active = false;
        store.upsert_students(&[s.clone()]).await.unwrap();
        store.clear_new_flags(&[5]).await.unwrap();

        s.active = true;
        store.upsert_students(&[s]).await.unwrap();
        let stored = store.get_student(5).await.unwrap().unwrap();
        assert!(stored.is_returned);
        assert!(!stored.is_new);
    }

    #[tokio::test]
    async fn login_change_keeps_previous_login() {
        let store = test_store().await;
        let mut s = student(7, "Linus", "T");
        s.github_user = Some("old-login".into());
        store.upsert_students(&[s.clone()]).await.unwrap();

        s.github_user = Some("new-login".into());
        store.upsert_students(&[s]).await.unwrap();

        let stored = store.get_student(7).await.unwrap().unwrap();
        assert_eq!(stored.github_user.as_deref(), Some("new-login"));
        assert_eq!(stored.github_user_previous.as_deref(), Some("old-login"));
        assert!(stored.github_renamed);

        store.clear_github_renamed(7).await.unwrap();
        assert!(!store.get_student(7).await.unwrap().unwrap().github_renamed);
    }

    #[tokio::test]
    async fn query_active_skips_inactive() {
        let store = test_store().await;
        let mut gone = student(2, "Alan", "Turing");
        gone.active = false;
        store
            .upsert_students(&[student(1, "Ada", "Lovelace"), gone])
            .await
            .unwrap();

        let active = store.query_active().await.unwrap();
        assert_eq!(active.iter().map(|s| s.client_id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(store.query_all_students().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn students_missing_from_fetch_are_deactivated() {
        let store = test_store().await;
        store
            .upsert_students(&[student(1, "Ada", "Lovelace"), student(2, "Alan", "Turing")])
            .await
            .unwrap();

        let removed = store.deactivate_missing_students(&[1]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!store.get_student(2).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn clear_new_flags_counts_only_flagged() {
        let store = test_store().await;
        store.upsert_students(&[student(1, "Ada", "Lovelace")]).await.unwrap();
        assert_eq!(store.clear_new_flags(&[1, 99]).await.unwrap(), 1);
        assert_eq!(store.clear_new_flags(&[1]).await.unwrap(), 0);
    }
}
