use camview_core::{CoreError, NotificationLedger};
use camview_metadata::{connect_options, create_sqlite_pool, run_migrations, SqliteNotificationLedger};
use chrono::{Duration, Utc};
use tempfile::TempDir;

struct TestContext {
    // Keeps the database directory alive for the duration of the test
    _dir: TempDir,
    db_path: String,
    ledger: SqliteNotificationLedger,
}

async fn setup_context() -> TestContext {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("notifier.db").display().to_string();
    let ledger = SqliteNotificationLedger::open(&db_path)
        .await
        .expect("open ledger");

    TestContext {
        _dir: dir,
        db_path,
        ledger,
    }
}

#[tokio::test]
async fn open_creates_database_file() {
    let ctx = setup_context().await;
    assert!(std::path::Path::new(&ctx.db_path).exists());
    assert_eq!(ctx.ledger.count().await.expect("count"), 0);
}

#[tokio::test]
async fn records_survive_reopen() {
    let ctx = setup_context().await;
    ctx.ledger
        .record_notified("2024/05/01/cam_0800.mp4")
        .await
        .expect("record");
    ctx.ledger.close().await;

    let reopened = SqliteNotificationLedger::open(&ctx.db_path)
        .await
        .expect("reopen ledger");
    assert!(reopened
        .is_notified("2024/05/01/cam_0800.mp4")
        .await
        .expect("lookup"));
    assert!(!reopened
        .is_notified("2024/05/01/cam_0900.mp4")
        .await
        .expect("lookup"));
}

#[tokio::test]
async fn duplicate_record_is_rejected() {
    let ctx = setup_context().await;
    let key = "2024/05/01/cam_0800.mp4";

    ctx.ledger.record_notified(key).await.expect("first record");
    let err = ctx
        .ledger
        .record_notified(key)
        .await
        .expect_err("second record must fail");
    assert!(matches!(err, CoreError::DuplicateKey(_)));
}

#[tokio::test]
async fn prune_respects_retention_window() {
    let ctx = setup_context().await;
    let now = Utc::now();

    for (key, age_days) in [
        ("2024/04/20/a.mp4", 10),
        ("2024/04/22/b.mp4", 8),
        ("2024/04/24/c.mp4", 6),
        ("2024/04/29/d.mp4", 1),
    ] {
        ctx.ledger
            .record_notified_at(key, now - Duration::days(age_days))
            .await
            .expect("seed record");
    }

    let removed = ctx
        .ledger
        .prune_older_than(Duration::days(7))
        .await
        .expect("prune");
    assert_eq!(removed, 2);
    assert_eq!(ctx.ledger.count().await.expect("count"), 2);

    // Pruning again is a no-op
    let removed = ctx
        .ledger
        .prune_older_than(Duration::days(7))
        .await
        .expect("prune");
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn shared_pool_sees_migrated_schema() {
    let ctx = setup_context().await;
    let options = connect_options(&ctx.db_path).expect("options");
    let pool = create_sqlite_pool(options)
        .await
        .expect("pool");
    // Re-running migrations on an up-to-date database is harmless
    run_migrations(&pool).await.expect("migrations");

    let second = SqliteNotificationLedger::new(pool);
    ctx.ledger
        .record_notified("2024/05/02/x.mp4")
        .await
        .expect("record");
    assert!(second.is_notified("2024/05/02/x.mp4").await.expect("lookup"));
}

#[tokio::test]
async fn unreachable_path_is_ledger_unavailable() {
    let dir = TempDir::new().expect("temp dir");
    let bogus = dir.path().join("missing-dir").join("nested").join("x.db");

    let err = SqliteNotificationLedger::open(&bogus.display().to_string())
        .await
        .err()
        .expect("open must fail");
    assert!(matches!(err, CoreError::LedgerUnavailable(_)));
}
