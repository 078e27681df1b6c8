//! Concurrent transactions do not see or disturb each other

use std::sync::mpsc;
use std::thread;

use tokio::sync::oneshot;

use crate::common::*;

fn counter_key(name: &str) -> Key {
    Key::with_name("Counter", name)
}

#[test]
fn interleaved_threads_keep_separate_transactions() {
    let t = TestDb::new();
    let (first_wrote_tx, first_wrote_rx) = mpsc::channel::<()>();
    let (second_done_tx, second_done_rx) = mpsc::channel::<()>();

    let db = &t.db;

    thread::scope(|s| {
        let first = s.spawn(move || {
            db.transaction(|| {
                db.put(&Counter::new("first", 1))?;
                first_wrote_tx.send(()).expect("signal");
                second_done_rx.recv().expect("wait for second");
                // The other transaction committed meanwhile; ours is unaffected
                assert!(db.in_transaction());
                db.put(&Counter::new("first-again", 2))?;
                Ok(())
            })
        });

        let second = s.spawn(move || {
            first_wrote_rx.recv().expect("wait for first");
            let result = db.transaction(|| {
                // The first transaction's buffered write is not visible here
                assert_eq!(db.get::<Counter>(&counter_key("first"))?, None);
                db.put(&Counter::new("second", 3))?;
                Ok(())
            });
            second_done_tx.send(()).expect("signal");
            result
        });

        second.join().expect("second thread").unwrap();
        first.join().expect("first thread").unwrap();
    });

    let log = t.store.commit_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].written, vec![counter_key("second")]);
    assert_eq!(
        log[1].written,
        vec![counter_key("first"), counter_key("first-again")]
    );
    assert_eq!(t.store.len(), 3);
}

#[test]
fn rollback_in_one_thread_does_not_affect_another() {
    let t = TestDb::new();
    let (ready_tx, ready_rx) = mpsc::channel::<()>();

    let db = &t.db;

    thread::scope(|s| {
        let failing = s.spawn(move || {
            db.transaction(|| -> Result<()> {
                db.put(&Counter::new("doomed", 1))?;
                ready_rx.recv().expect("wait");
                Err(Error::Backend("give up".to_string()))
            })
        });
        let succeeding = s.spawn(move || {
            let result = db.transaction(|| db.put(&Counter::new("kept", 2)));
            ready_tx.send(()).expect("signal");
            result
        });

        succeeding.join().expect("thread").unwrap();
        assert!(failing.join().expect("thread").is_err());
    });

    assert_eq!(t.db.get::<Counter>(&counter_key("doomed")).unwrap(), None);
    assert_eq!(
        t.db.get::<Counter>(&counter_key("kept")).unwrap(),
        Some(Counter::new("kept", 2))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_async_transactions_use_their_own_context() {
    let t = TestDb::new();
    let (a_started_tx, a_started_rx) = oneshot::channel::<Option<u64>>();
    let (b_done_tx, b_done_rx) = oneshot::channel::<Option<u64>>();

    let db_a = t.db.clone();
    let task_a = tokio::spawn(async move {
        let db = db_a.clone();
        db_a.transaction_async(|| async move {
            let own = db.context().transaction().map(|txn| txn.id());
            db.put_async(Counter::new("a", 1)).await?;
            a_started_tx.send(own).expect("signal");
            let other = b_done_rx.await.expect("wait for b");
            assert_ne!(own, other);
            assert_eq!(db.context().transaction().map(|txn| txn.id()), own);
            Ok::<_, Error>(own)
        })
        .await
    });

    let db_b = t.db.clone();
    let task_b = tokio::spawn(async move {
        let a_txn = a_started_rx.await.expect("wait for a");
        let db = db_b.clone();
        let own = db_b
            .transaction_async(|| async move {
                let own = db.context().transaction().map(|txn| txn.id());
                assert_ne!(own, a_txn);
                // Not committed yet, so not visible
                assert_eq!(db.get_async::<Counter>(counter_key("a")).await?, None);
                db.put_async(Counter::new("b", 2)).await?;
                Ok::<_, Error>(own)
            })
            .await?;
        // Signal only after committing, so the reads above cannot conflict
        b_done_tx.send(own).expect("signal");
        Ok::<_, Error>(own)
    });

    let a = task_a.await.unwrap().unwrap();
    let b = task_b.await.unwrap().unwrap();
    assert!(a.is_some() && b.is_some());
    assert_ne!(a, b);
    assert_eq!(t.store.commit_log().len(), 2);
    assert_eq!(t.store.len(), 2);
}
