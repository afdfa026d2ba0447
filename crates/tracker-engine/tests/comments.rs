//! Comment backfill passes, sentinel fill, and rate-limit aborts.

mod support;

use pretty_assertions::assert_eq;
use tracker_config::ImportConfig;
use tracker_core::ActiveRoster;
use tracker_core::enums::{CommentPhase, LogCode};
use tracker_core::records::CommentState;
use tracker_db::TrackerStore;
use tracker_engine::ImportEngine;
use tracker_sources::CommentScope;

use support::*;

async fn seeded_store() -> (TrackerStore, ActiveRoster) {
    let store = store().await;
    store
        .upsert_students(&[student(1, "Ada", Some("adal")), student(2, "Grace", Some("ghopper"))])
        .await
        .unwrap();
    store
        .upsert_attendance(&[
            visit(1, 100, "2024-03-07", Some(1)),
            visit(1, 101, "2024-03-08", Some(0)),
            visit(2, 200, "2024-03-07", Some(1)),
            visit(2, 201, "2024-03-07", None),
        ])
        .await
        .unwrap();
    let roster = ActiveRoster::from_students(store.query_active().await.unwrap());
    (store, roster)
}

#[tokio::test]
async fn rate_limited_bulk_pass_stops_the_backfill() {
    let (store, roster) = seeded_store().await;
    let comments = FakeComments {
        rate_limited: vec![CommentScope::Organization],
        ..FakeComments::default()
    };
    let config = ImportConfig::default();
    let engine = ImportEngine::new(&store, &config, TZ, run_time());

    let report = engine
        .import_comments(engine.import_start(), &comments, &roster)
        .await
        .unwrap();

    assert!(report.is_aborted());
    assert_eq!(
        report.phases,
        vec![
            CommentPhase::Idle,
            CommentPhase::Fetching,
            CommentPhase::BulkImport,
            CommentPhase::Aborted,
        ]
    );
    assert_eq!(comments.requests(), vec!["organization"]);
    assert_eq!(report.sentinels, 0);

    let logs = store.query_logs().await.unwrap();
    assert_eq!(
        logs.iter().map(|e| e.code).collect::<Vec<_>>(),
        vec![LogCode::StartingGithubImport, LogCode::GithubImportAborted]
    );
    assert_eq!(logs[1].detail, ": Github API rate limit exceeded ***");

    // Nothing was marked; the next run starts over from the same events.
    let pending = store.query_missing_comments(day("2024-03-05")).await.unwrap();
    assert_eq!(pending.len(), 3);
}

#[tokio::test]
async fn passes_attach_comments_then_fill_sentinels() {
    let (store, roster) = seeded_store().await;
    let mut comments = FakeComments::default();
    comments.by_scope.insert(
        CommentScope::Organization,
        vec![
            commit("adal", "loops-adal", "second", "2024-03-07", 20),
            commit("adal", "arrays-adal", "first", "2024-03-07", 18),
            commit("nobody", "x", "unmatched", "2024-03-07", 18),
        ],
    );
    comments.by_scope.insert(
        CommentScope::Level(0),
        vec![commit("ADAL", "intro-adal", "hello world", "2024-03-08", 19)],
    );

    let config = ImportConfig::default();
    let engine = ImportEngine::new(&store, &config, TZ, run_time());
    let start = engine.import_start();
    let report = engine.import_comments(start, &comments, &roster).await.unwrap();

    assert_eq!(report.phase(), CommentPhase::Complete);
    assert_eq!((report.pending, report.matched, report.sentinels), (3, 2, 1));
    assert_eq!(comments.requests(), vec!["organization", "level 0", "level 1"]);

    assert_eq!(
        store.get_attendance(1, 100).await.unwrap().unwrap().comment,
        CommentState::Authored {
            text: "first\nsecond".into(),
            repo: Some("arrays-adal".into()),
        }
    );
    assert!(matches!(
        store.get_attendance(1, 101).await.unwrap().unwrap().comment,
        CommentState::Authored { .. }
    ));
    assert_eq!(
        store.get_attendance(2, 200).await.unwrap().unwrap().comment,
        CommentState::Processed
    );
    // Events without a level never need a comment.
    assert_eq!(
        store.get_attendance(2, 201).await.unwrap().unwrap().comment,
        CommentState::Missing
    );

    // Sentinel-marked events are no longer pending.
    assert!(store.query_missing_comments(start).await.unwrap().is_empty());
    let again = engine.import_comments(start, &comments, &roster).await.unwrap();
    assert_eq!(
        again.phases,
        vec![CommentPhase::Idle, CommentPhase::Fetching, CommentPhase::Complete]
    );
    assert_eq!(comments.requests().len(), 3);
    assert_eq!(log_codes(&store).await.last(), Some(&LogCode::GithubImportComplete));
}

#[tokio::test]
async fn renamed_students_are_searched_under_their_old_login() {
    let store = store().await;
    store
        .upsert_students(&[student(3, "Linus", Some("old-login"))])
        .await
        .unwrap();
    store
        .upsert_students(&[student(3, "Linus", Some("new-login"))])
        .await
        .unwrap();
    store
        .upsert_attendance(&[visit(3, 300, "2024-03-07", Some(1))])
        .await
        .unwrap();
    let roster = ActiveRoster::from_students(store.query_active().await.unwrap());
    assert_eq!(roster.renamed_students().count(), 1);

    let mut comments = FakeComments::default();
    comments.by_user.insert(
        "old-login".into(),
        vec![commit("old-login", "loops-linus", "pushed before the rename", "2024-03-07", 21)],
    );

    let config = ImportConfig::default();
    let engine = ImportEngine::new(&store, &config, TZ, run_time());
    let report = engine
        .import_comments(engine.import_start(), &comments, &roster)
        .await
        .unwrap();

    assert_eq!((report.matched, report.renamed, report.sentinels), (0, 1, 0));
    assert_eq!(
        comments.requests(),
        vec!["organization", "level 1", "user:old-login"]
    );
    assert!(!store.get_student(3).await.unwrap().unwrap().github_renamed);
    assert!(matches!(
        store.get_attendance(3, 300).await.unwrap().unwrap().comment,
        CommentState::Authored { .. }
    ));
}

#[tokio::test]
async fn rate_limit_during_level_pass_keeps_bulk_matches() {
    let (store, roster) = seeded_store().await;
    let mut comments = FakeComments {
        rate_limited: vec![CommentScope::Level(0)],
        ..FakeComments::default()
    };
    comments.by_scope.insert(
        CommentScope::Organization,
        vec![commit("ghopper", "bugs-grace", "found a moth", "2024-03-07", 22)],
    );

    let config = ImportConfig::default();
    let engine = ImportEngine::new(&store, &config, TZ, run_time());
    let report = engine
        .import_comments(engine.import_start(), &comments, &roster)
        .await
        .unwrap();

    assert!(report.is_aborted());
    assert!(report.visited(CommentPhase::LevelPasses));
    assert!(!report.visited(CommentPhase::SentinelFill));
    assert_eq!(report.matched, 1);
    assert!(matches!(
        store.get_attendance(2, 200).await.unwrap().unwrap().comment,
        CommentState::Authored { .. }
    ));
    assert_eq!(
        store
            .query_missing_comments(engine.import_start())
            .await
            .unwrap()
            .len(),
        2
    );
}
