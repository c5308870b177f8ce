use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use neon_pg::test_utils::{TestDb, TestTx};
use neon_pg::{
    CommandTag, IsolationLevel, NeonPgError, ROLLBACK_TIMEOUT, RowValues, SafeError, TxOptions,
    with_tx,
};

fn db_with(tx: &TestTx) -> TestDb {
    let tx = tx.clone();
    TestDb::new().on_begin_tx(move |_| Ok(Box::new(tx.clone())))
}

fn shared_cause(msg: &str) -> Arc<dyn std::error::Error + Send + Sync> {
    Arc::new(io::Error::other(msg.to_string()))
}

#[tokio::test]
async fn success_commits_once() {
    let tx = TestTx::new();
    let db = db_with(&tx);

    let got: Result<i64, NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async { Ok(42) })).await;

    assert_eq!(got.unwrap(), 42);
    assert_eq!(tx.commit_calls(), 1);
    assert_eq!(tx.rollback_calls(), 0);
}

#[tokio::test]
async fn work_error_rolls_back_and_is_returned_unchanged() {
    let tx = TestTx::new();
    let db = db_with(&tx);
    let cause = shared_cause("constraint violated");
    let work_err = NeonPgError::Safe(SafeError::from_shared("insert failed", Arc::clone(&cause)));

    let got: Result<(), NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async move { Err(work_err) })).await;

    let err = got.unwrap_err();
    assert_eq!(err.to_string(), "insert failed");
    assert!(err.as_safe().unwrap().same_cause(&cause));
    assert_eq!(tx.commit_calls(), 0);
    assert_eq!(tx.rollback_calls(), 1);
}

#[tokio::test]
async fn rollback_failure_never_masks_the_work_error() {
    let tx = TestTx::new().with_rollback_error(NeonPgError::PoolClosed);
    let db = db_with(&tx);

    let got: Result<(), NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async { Err(NeonPgError::NoRows) }))
            .await;

    assert!(matches!(got, Err(NeonPgError::NoRows)));
    assert_eq!(tx.rollback_calls(), 1);
}

#[derive(Debug, PartialEq)]
struct Boom(u32);

#[tokio::test]
async fn panic_rolls_back_then_resumes_with_the_same_payload() {
    let tx = TestTx::new();
    let db = db_with(&tx);

    let outcome = AssertUnwindSafe(with_tx::<(), NeonPgError, _>(
        &db,
        TxOptions::default(),
        |_tx| {
            Box::pin(async {
                if tx_should_panic() {
                    std::panic::panic_any(Boom(7));
                }
                Ok(())
            })
        },
    ))
    .catch_unwind()
    .await;

    let payload = outcome.expect_err("panic should propagate");
    assert_eq!(payload.downcast_ref::<Boom>(), Some(&Boom(7)));
    assert_eq!(tx.commit_calls(), 0);
    assert_eq!(tx.rollback_calls(), 1);
}

fn tx_should_panic() -> bool {
    true
}

#[tokio::test]
async fn commit_failure_rolls_back_and_wraps_the_commit_cause() {
    let cause = shared_cause("connection reset");
    let tx = TestTx::new()
        .with_commit_error(NeonPgError::Safe(SafeError::from_shared("commit", Arc::clone(&cause))))
        .with_rollback_error(NeonPgError::TxClosed);
    let db = db_with(&tx);

    let got: Result<(), NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async { Ok(()) })).await;

    let err = got.unwrap_err();
    assert_eq!(err.to_string(), "neon-pg: commit tx failed");
    let commit_err = err.as_safe().unwrap().find_cause::<NeonPgError>().unwrap();
    assert!(commit_err.as_safe().unwrap().same_cause(&cause));
    assert_eq!(tx.commit_calls(), 1);
    assert_eq!(tx.rollback_calls(), 1);
}

#[tokio::test]
async fn driver_commit_error_is_reachable_by_type() {
    let driver = "port=notaport"
        .parse::<tokio_postgres::Config>()
        .unwrap_err();
    let shown = driver.to_string();
    let tx = TestTx::new().with_commit_error(NeonPgError::from(driver));
    let db = db_with(&tx);

    let got: Result<(), NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async { Ok(()) })).await;

    let err = got.unwrap_err();
    assert_eq!(err.to_string(), "neon-pg: commit tx failed");
    let found = err
        .as_safe()
        .unwrap()
        .find_cause::<tokio_postgres::Error>()
        .expect("driver error should be reachable");
    assert_eq!(found.to_string(), shown);
}

#[tokio::test]
async fn begin_failure_is_safe_wrapped_and_runs_nothing() {
    let db = TestDb::new();
    let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ran_in = Arc::clone(&ran);

    let got: Result<(), NeonPgError> = with_tx(&db, TxOptions::default(), move |_tx| {
        ran_in.store(true, std::sync::atomic::Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    })
    .await;

    let err = got.unwrap_err();
    assert_eq!(err.to_string(), "neon-pg: begin tx failed");
    assert!(matches!(
        err.as_safe().unwrap().find_cause::<NeonPgError>(),
        Some(NeonPgError::NotMocked)
    ));
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn options_and_statements_reach_the_transaction() {
    let inner = Arc::new(TestDb::new().on_exec(|sql, args| {
        assert_eq!(sql, "UPDATE accounts SET balance = $1");
        assert_eq!(args.len(), 1);
        Ok(CommandTag::new(3))
    }));
    let tx = TestTx::new().with_db(inner);
    let tx_for_db = tx.clone();
    let db = TestDb::new().on_begin_tx(move |opts| {
        assert_eq!(opts.isolation, Some(IsolationLevel::Serializable));
        Ok(Box::new(tx_for_db.clone()))
    });

    let got: Result<u64, NeonPgError> = with_tx(
        &db,
        TxOptions::default().isolation(IsolationLevel::Serializable),
        |tx| {
            Box::pin(async move {
                let tag = tx
                    .exec("UPDATE accounts SET balance = $1", &[RowValues::Int(0)])
                    .await?;
                Ok(tag.rows_affected)
            })
        },
    )
    .await;

    assert_eq!(got.unwrap(), 3);
    assert_eq!(tx.commit_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rollback_has_its_own_bounded_budget() {
    let tx = TestTx::new().with_rollback_delay(Duration::from_secs(3600));
    let db = db_with(&tx);
    let start = tokio::time::Instant::now();

    let got: Result<(), NeonPgError> =
        with_tx(&db, TxOptions::default(), |_tx| Box::pin(async { Err(NeonPgError::NoRows) }))
            .await;

    assert!(matches!(got, Err(NeonPgError::NoRows)));
    assert_eq!(tx.rollback_calls(), 1);
    let elapsed = start.elapsed();
    assert!(elapsed >= ROLLBACK_TIMEOUT, "{elapsed:?}");
    assert!(elapsed < ROLLBACK_TIMEOUT + Duration::from_secs(1), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn rollback_budget_starts_when_rollback_starts() {
    // Work that runs longer than the budget must not eat into it.
    let tx = TestTx::new().with_rollback_delay(Duration::from_secs(4));
    let db = db_with(&tx);
    let start = tokio::time::Instant::now();

    let got: Result<(), NeonPgError> = with_tx(&db, TxOptions::default(), |_tx| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(NeonPgError::NoRows)
        })
    })
    .await;

    assert!(matches!(got, Err(NeonPgError::NoRows)));
    assert_eq!(tx.rollback_calls(), 1);
    // 30s of work plus the full 4s rollback: nothing was cut short.
    assert!(start.elapsed() >= Duration::from_secs(34));
}

#[tokio::test(start_paused = true)]
async fn abandoned_transaction_is_rolled_back_in_background() {
    let tx = TestTx::new();
    let db = db_with(&tx);

    let timed_out = tokio::time::timeout(
        Duration::from_secs(1),
        with_tx::<(), NeonPgError, _>(&db, TxOptions::default(), |_tx| {
            Box::pin(std::future::pending::<Result<(), NeonPgError>>())
        }),
    )
    .await;
    assert!(timed_out.is_err());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(tx.rollback_calls(), 1);
    assert_eq!(tx.commit_calls(), 0);
}
