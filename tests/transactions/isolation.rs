//! Transaction isolation and commit/rollback visibility

use crate::common::*;

#[test]
fn writes_are_invisible_until_commit() {
    let t = TestDb::new();
    let observer = t.db.clone();

    t.db.transaction(|| {
        t.db.put(&Counter::new("a", 1))?;
        // A read through the backend client directly does not see the buffer
        let outside = entitymap::with_context(
            entitymap::DbContext::client(observer.id(), observer.datastore().clone()),
            || observer.get::<Counter>(&Counter::new("a", 0).key),
        )?;
        assert_eq!(outside, None);
        assert!(t.store.is_empty());
        Ok(())
    })
    .unwrap();

    assert_eq!(
        t.db.get::<Counter>(&Counter::new("a", 0).key).unwrap(),
        Some(Counter::new("a", 1))
    );
}

#[test]
fn failed_block_discards_writes_and_returns_its_error() {
    let t = TestDb::new();
    let result: Result<()> = t.db.transaction(|| {
        t.db.put(&Counter::new("a", 1))?;
        t.db.put(&Counter::new("b", 2))?;
        Err(Error::Backend("business rule violated".to_string()))
    });

    match result {
        Err(Error::Backend(message)) => assert_eq!(message, "business rule violated"),
        other => panic!("expected the block's error, got {:?}", other),
    }
    assert!(t.store.is_empty());
    assert!(t.store.commit_log().is_empty());
    assert!(!t.db.in_transaction());
}

#[test]
fn block_value_is_returned() {
    let t = TestDb::new();
    let key = t
        .db
        .transaction(|| t.db.put(&Counter::new("a", 1)))
        .unwrap();
    assert_eq!(key, Key::with_name("Counter", "a"));
}

#[test]
fn read_modify_write_in_one_commit() {
    let t = TestDb::new();
    t.db.put(&Counter::new("a", 10)).unwrap();

    t.db.transaction(|| {
        let mut counter: Counter = t.db.get(&Key::with_name("Counter", "a"))?.unwrap();
        counter.value += 5;
        t.db.put(&counter)?;
        t.db.delete(&Key::with_name("Counter", "missing"))
    })
    .unwrap();

    let log = t.store.commit_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].written, vec![Key::with_name("Counter", "a")]);
    assert_eq!(log[0].deleted, vec![Key::with_name("Counter", "missing")]);
    assert_eq!(
        t.db.get::<Counter>(&Key::with_name("Counter", "a")).unwrap(),
        Some(Counter::new("a", 15))
    );
}

#[test]
fn conflicting_write_fails_commit() {
    let t = TestDb::new();
    t.db.put(&Counter::new("a", 1)).unwrap();
    let other = t.db.clone();

    let result = t.db.transaction(|| {
        let counter: Counter = t.db.get(&Key::with_name("Counter", "a"))?.unwrap();
        // Another writer commits to the same key outside this transaction
        std::thread::scope(|s| {
            s.spawn(|| other.put(&Counter::new("a", 100)))
                .join()
                .expect("writer thread")
        })?;
        t.db.put(&Counter::new("a", counter.value + 1))?;
        Ok(())
    });

    assert!(matches!(result, Err(Error::Conflict { .. })));
    assert_eq!(
        t.db.get::<Counter>(&Key::with_name("Counter", "a")).unwrap(),
        Some(Counter::new("a", 100))
    );
}
