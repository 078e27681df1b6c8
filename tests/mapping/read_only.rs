//! Read-only record types

use crate::common::*;
use entitymap::{to_entity, ReaderWriter};
use once_cell::sync::Lazy;

#[derive(Debug, Clone, PartialEq)]
struct AuditEntry {
    key: Key,
    message: String,
}

impl Record for AuditEntry {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("AuditEntry")
                .key("key")
                .field::<String>("message")
                .read_only()
                .build()
        });
        &SCHEMA
    }
    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("message", &self.message)
    }
    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            key: r.key()?,
            message: r.require("message")?,
        })
    }
}

impl Model for AuditEntry {
    fn key(&self) -> &Key {
        &self.key
    }
}

fn entry(id: i64) -> AuditEntry {
    AuditEntry {
        key: Key::with_id("AuditEntry", id),
        message: format!("event {}", id),
    }
}

#[test]
fn single_put_is_rejected_without_backend_call() {
    let t = TestDb::new();
    match t.db.put(&entry(1)) {
        Err(Error::ReadOnly { kind }) => assert_eq!(kind, "AuditEntry"),
        other => panic!("expected ReadOnly, got {:?}", other),
    }
    assert_eq!(t.store.counts().puts(), 0);
    assert!(t.store.is_empty());
}

#[test]
fn batch_put_is_rejected_without_backend_call() {
    let t = TestDb::new();
    let batch: Vec<AuditEntry> = (1..=5).map(entry).collect();
    assert!(matches!(
        t.db.put_many(&batch),
        Err(Error::ReadOnly { .. })
    ));
    assert_eq!(t.store.counts().puts(), 0);
}

#[test]
fn rejected_inside_transaction_without_backend_call() {
    let t = TestDb::new();
    let result = t.db.transaction(|| t.db.put(&entry(1)));
    assert!(matches!(result, Err(Error::ReadOnly { .. })));
    assert_eq!(t.store.counts().puts(), 0);
    assert_eq!(t.store.counts().commits(), 0);
}

#[test]
fn read_only_records_still_load() {
    let t = TestDb::new();
    // Written by some other process
    t.store.put(vec![to_entity(&entry(7)).unwrap()]).unwrap();
    assert_eq!(t.db.get::<AuditEntry>(&entry(7).key).unwrap(), Some(entry(7)));
    assert_eq!(t.db.query(&ModelQuery::<AuditEntry>::new()).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_put_is_rejected() {
    let t = TestDb::new();
    assert!(matches!(
        t.db.put_async(entry(1)).await,
        Err(Error::ReadOnly { .. })
    ));
    assert_eq!(t.store.counts().puts(), 0);
}
