//! Context propagation into nested blocks and spawned work

use std::time::Duration;

use crate::common::*;
use entitymap::{spawn, spawn_blocking, Direction, TransactionOptions};

#[test]
fn nested_blocks_flatten_into_one_transaction() {
    let t = TestDb::new();
    t.db.transaction(|| {
        t.db.put(&Counter::new("outer", 1))?;
        t.db.transaction(|| {
            t.db.put(&Counter::new("inner", 2))?;
            t.db.transaction(|| t.db.put(&Counter::new("innermost", 3)))
        })?;
        // Nothing is visible yet: the inner blocks did not commit
        assert!(t.store.is_empty());
        Ok(())
    })
    .unwrap();

    let log = t.store.commit_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].written.len(), 3);
    assert_eq!(t.store.counts().begins(), 1);
}

#[test]
fn inner_failure_aborts_the_whole_transaction() {
    let t = TestDb::new();
    let result: Result<()> = t.db.transaction(|| {
        t.db.put(&Counter::new("outer", 1))?;
        t.db.transaction(|| -> Result<()> {
            t.db.put(&Counter::new("inner", 2))?;
            Err(Error::Backend("inner".to_string()))
        })
    });
    assert!(matches!(result, Err(Error::Backend(_))));
    assert!(t.store.is_empty());
}

#[test]
fn disabled_propagation_rejects_nesting() {
    let t = TestDb::new();
    let result = t.db.transaction(|| {
        t.db.transaction_with(TransactionOptions::new().propagate(false), || Ok(()))
    });
    assert!(matches!(result, Err(Error::TransactionState(_))));

    // Outside a transaction the option is irrelevant
    t.db.transaction_with(TransactionOptions::new().propagate(false), || {
        t.db.put(&Counter::new("a", 1))
    })
    .unwrap();
    assert_eq!(t.store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_tasks_join_before_commit() {
    let t = TestDb::new();
    let db = t.db.clone();

    t.db.transaction_async(|| async move {
        for i in 0..4u64 {
            let db = db.clone();
            spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * (4 - i))).await;
                db.put(&Counter::new(&format!("task{}", i), i as i64))
            });
        }
        Ok(())
    })
    .await
    .unwrap();

    let log = t.store.commit_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].written.len(), 4);
    assert_eq!(t.store.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_jobs_run_in_the_transaction() {
    let t = TestDb::new();
    let db = t.db.clone();

    let seen = t
        .db
        .transaction_async(|| async move {
            let inner = db.clone();
            spawn_blocking(move || {
                let in_txn = inner.in_transaction();
                inner.put(&Counter::new("blocking", 1)).map(|_| in_txn)
            })
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?
        })
        .await
        .unwrap();

    assert!(seen);
    assert_eq!(t.store.commit_log().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn plain_tokio_spawn_does_not_inherit_the_transaction() {
    let t = TestDb::new();
    let db = t.db.clone();

    t.db.transaction_async(|| async move {
        let outside = db.clone();
        let in_txn = tokio::spawn(async move { outside.in_transaction() })
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))?;
        assert!(!in_txn);
        Ok::<_, Error>(())
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_operations_join_the_callers_transaction() {
    let t = TestDb::new();
    let db = t.db.clone();

    let result: Result<()> = t
        .db
        .transaction_async(|| async move {
            db.put_async(Counter::new("a", 1)).await?;
            // Left in flight: the block still waits for it
            let _late = db.put_async(Counter::new("b", 2));
            Err(Error::Backend("abort".to_string()))
        })
        .await;

    assert!(matches!(result, Err(Error::Backend(_))));
    assert!(t.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn context_is_restored_after_async_block() {
    let t = TestDb::new();
    let db = t.db.clone();
    t.db.transaction_async(|| async move {
        assert!(db.in_transaction());
        Ok(())
    })
    .await
    .unwrap();
    assert!(!t.db.in_transaction());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unawaited_failing_operation_aborts_the_transaction() {
    let t = TestDb::new();
    let db = t.db.clone();

    let result: Result<()> = t
        .db
        .transaction_async(|| async move {
            db.put(&Counter::new("parent", 1))?;
            // Fails on the blocking pool; nobody awaits it
            let _bad = db.query_async(
                ModelQuery::<Counter>::new().order_by("missing", Direction::Ascending),
            );
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(Error::UnknownField { .. })));
    assert!(t.store.is_empty());
    assert_eq!(t.store.counts().commits(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_spawned_task_aborts_the_transaction() {
    let t = TestDb::new();
    let db = t.db.clone();

    let result: Result<()> = t
        .db
        .transaction_async(|| async move {
            db.put(&Counter::new("parent", 1))?;
            spawn(async { Err::<(), _>(Error::Backend("child failed".to_string())) });
            Ok(())
        })
        .await;

    match result {
        Err(Error::Backend(msg)) => assert_eq!(msg, "child failed"),
        other => panic!("expected the child's error, got {:?}", other),
    }
    assert!(t.store.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_block_joins_async_children_off_the_worker() {
    let t = TestDb::new();
    let db = t.db.clone();

    tokio::task::block_in_place(|| {
        db.transaction(|| {
            let child = db.clone();
            spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                child.put(&Counter::new("late", 1))
            });
            Ok(())
        })
    })
    .unwrap();

    let log = t.store.commit_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].written.len(), 1);
    assert_eq!(t.store.len(), 1);
}
