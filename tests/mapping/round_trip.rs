//! Round trips for every field kind

use crate::common::*;
use chrono::{NaiveDate, NaiveTime};
use entitymap::{from_entity, to_entity, Value};

#[test]
fn full_record_round_trips_through_database() {
    let t = TestDb::new();
    let person = sample_person(1);

    let key = t.db.put(&person).unwrap();
    assert_eq!(key, person.key);

    let loaded: Person = t.db.get(&key).unwrap().expect("stored person");
    assert_eq!(loaded, person);
}

#[test]
fn empty_and_none_values_round_trip() {
    let t = TestDb::new();
    let mut person = sample_person(2);
    person.manager = None;
    person.nickname = None;
    person.scores = Vec::new();
    person.aliases = Vec::new();
    person.work = None;
    person.phones = Vec::new();
    person.avatar = Blob::default();

    t.db.put(&person).unwrap();
    let loaded: Person = t.db.get(&person.key).unwrap().unwrap();
    assert_eq!(loaded, person);
}

#[test]
fn entity_layout_uses_storage_names_and_index_hints() {
    let person = sample_person(3);
    let entity = to_entity(&person).unwrap();

    assert_eq!(entity.key(), &person.key);
    // The key field never becomes a property
    assert!(!entity.contains("key"));

    let name = entity.get("n").unwrap();
    assert_eq!(name.value, Value::from("Person 3"));
    assert!(name.indexed);
    assert!(!entity.contains("name"));

    assert!(!entity.get("height").unwrap().indexed);
    assert_eq!(entity.value("nickname"), Some(&Value::Null));
    assert_eq!(
        entity.value("scores"),
        Some(&Value::Array(vec![Value::Int(3), Value::Int(1), Value::Int(4)]))
    );
    assert_eq!(
        entity.value("manager"),
        Some(&Value::Key(Key::with_name("Person", "boss")))
    );
    assert!(matches!(entity.value("profile"), Some(Value::Entity(_))));
    assert_eq!(entity.value("name_len"), Some(&Value::Int(8)));
}

#[test]
fn dates_and_times_are_stored_as_timestamps() {
    let person = sample_person(4);
    let entity = to_entity(&person).unwrap();

    match entity.value("birthday") {
        Some(Value::Timestamp(ts)) => {
            assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(1990, 7, 14).unwrap());
            assert_eq!(ts.time(), NaiveTime::MIN);
        }
        other => panic!("expected timestamp, got {:?}", other),
    }
    match entity.value("alarm") {
        Some(Value::Timestamp(ts)) => {
            assert_eq!(ts.date_naive(), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
            assert_eq!(ts.time(), NaiveTime::from_hms_opt(6, 45, 0).unwrap());
        }
        other => panic!("expected timestamp, got {:?}", other),
    }
}

#[test]
fn computed_field_is_written_but_not_read() {
    let person = sample_person(5);
    let mut entity = to_entity(&person).unwrap();
    entity.set("name_len", entitymap::Property::unindexed(Value::Int(999)));

    let decoded: Person = from_entity(entity).unwrap();
    assert_eq!(decoded.name_len(), 8);
}

struct Headline {
    key: Key,
    text: String,
}

impl Record for Headline {
    fn schema() -> &'static Schema {
        static SCHEMA: once_cell::sync::Lazy<Schema> = once_cell::sync::Lazy::new(|| {
            Schema::builder("Headline")
                .key("key")
                .field::<String>("text")
                .computed::<String>("shouted")
                .build()
        });
        &SCHEMA
    }
    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("text", &self.text)?;
        w.field("shouted", &self.text.to_uppercase())
    }
    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            key: r.key()?,
            text: r.require("text")?,
        })
    }
}

impl Model for Headline {
    fn key(&self) -> &Key {
        &self.key
    }
}

#[test]
fn computed_field_is_refused_by_the_reader() {
    let headline = Headline {
        key: Key::with_id("Headline", 1),
        text: "quiet".to_string(),
    };
    let entity = to_entity(&headline).unwrap();
    assert_eq!(entity.value("shouted"), Some(&Value::from("QUIET")));

    let decoded: Headline = from_entity(entity.clone()).unwrap();
    assert_eq!(decoded.text, "quiet");

    let result = entitymap::decode_properties::<Peek>(entity.properties().clone());
    assert!(matches!(
        result,
        Err(Error::Unsupported { ref property, .. }) if property == "shouted"
    ));
}

/// Reads `shouted` back through the headline schema
struct Peek;

impl Record for Peek {
    fn schema() -> &'static Schema {
        Headline::schema()
    }
    fn encode(&self, _w: &mut EntityWriter) -> Result<()> {
        Ok(())
    }
    fn decode(r: &mut EntityReader) -> Result<Self> {
        let _: String = r.require("shouted")?;
        Ok(Peek)
    }
}

#[test]
fn incomplete_key_gets_allocated_id() {
    let t = TestDb::new();
    let mut person = sample_person(0);
    person.key = Key::incomplete("Person");

    let key = t.db.put(&person).unwrap();
    assert!(key.is_complete());
    assert!(key.id_value().is_some());

    let loaded: Person = t.db.get(&key).unwrap().unwrap();
    assert_eq!(loaded.key, key);
    assert_eq!(loaded.name, person.name);
}

#[test]
fn get_many_keeps_request_order_and_gaps() {
    let t = TestDb::new();
    t.db.put_many(&[sample_person(1), sample_person(3)]).unwrap();

    let found: Vec<Option<Person>> = t
        .db
        .get_many(&[
            Key::with_id("Person", 3),
            Key::with_id("Person", 2),
            Key::with_id("Person", 1),
        ])
        .unwrap();
    let ids: Vec<Option<i64>> = found
        .iter()
        .map(|p| p.as_ref().and_then(|p| p.key.id_value()))
        .collect();
    assert_eq!(ids, vec![Some(3), None, Some(1)]);
}

#[test]
fn delete_then_get_is_none() {
    let t = TestDb::new();
    let key = t.db.put(&sample_person(9)).unwrap();
    t.db.delete(&key).unwrap();
    assert_eq!(t.db.get::<Person>(&key).unwrap(), None);
    // Deleting again is not an error
    t.db.delete(&key).unwrap();
}
