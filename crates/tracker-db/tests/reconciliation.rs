//! Reconciliation across store reopen: a second run against the same
//! database file sees the first run's rows and writes nothing new.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tracker_core::DateWindow;
use tracker_core::enums::AttendanceStatus;
use tracker_core::records::{AttendanceEvent, CommentState, StudentRecord};
use tracker_db::TrackerStore;

fn event(visit_id: i64, date: &str) -> AttendanceEvent {
    let starts_at = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(16, 0, 0)
        .unwrap();
    AttendanceEvent {
        client_id: 1,
        visit_id,
        service_name: "Java Level 0".into(),
        event_name: "Java Level 0".into(),
        course_id: None,
        starts_at,
        status: AttendanceStatus::Completed,
        level: Some(0),
        comment: CommentState::Missing,
    }
}

#[tokio::test]
async fn second_run_on_same_file_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");
    let path = path.to_str().unwrap();

    let students = vec![StudentRecord::new(1, "Ada", "Lovelace")];
    let events = vec![event(10, "2024-03-04"), event(11, "2024-03-11")];

    {
        let store = TrackerStore::open_local(path).await.unwrap();
        assert_eq!(store.upsert_students(&students).await.unwrap().inserted, 1);
        assert_eq!(store.upsert_attendance(&events).await.unwrap().inserted, 2);
        store.mark_comment_processed(1, 10).await.unwrap();
        store.close();
    }

    let store = TrackerStore::open_local(path).await.unwrap();
    let s = store.upsert_students(&students).await.unwrap();
    let a = store.upsert_attendance(&events).await.unwrap();
    assert_eq!((s.written(), a.written()), (0, 0));

    let pending = store
        .query_missing_comments(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(pending.iter().map(|e| e.visit_id).collect::<Vec<_>>(), vec![11]);
}

#[tokio::test]
async fn empty_batches_write_nothing() {
    let store = TrackerStore::open_local(":memory:").await.unwrap();
    assert_eq!(store.upsert_students(&[]).await.unwrap().written(), 0);
    assert_eq!(store.upsert_attendance(&[]).await.unwrap().written(), 0);
    assert_eq!(store.upsert_schedule(&[]).await.unwrap().written(), 0);
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
    .unwrap();
    assert_eq!(store.upsert_courses(&[], &window).await.unwrap().written(), 0);
    assert!(store.query_all_students().await.unwrap().is_empty());
}
