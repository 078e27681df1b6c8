//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use entitymap::{
    Blob, Database, DatastoreConfig, EntityReader, EntityWriter, Error, FilterBuilder, GeoPoint,
    Key, MemoryDatastore, Model, ModelQuery, Record, Result, Schema,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness output
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// TestDb
// ============================================================================

/// Database over a memory store the test can inspect directly
pub struct TestDb {
    pub db: Database,
    pub store: MemoryDatastore,
}

impl TestDb {
    pub fn new() -> Self {
        Self::with_config(DatastoreConfig::test("integration"))
    }

    pub fn with_config(config: DatastoreConfig) -> Self {
        init_tracing();
        let store = MemoryDatastore::new();
        let db = Database::builder()
            .config(config)
            .client(Arc::new(store.clone()))
            .open()
            .expect("open test database");
        Self { db, store }
    }
}

// ============================================================================
// Models
// ============================================================================

/// Embedded as a sub-entity
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub bio: String,
    pub rating: f64,
}

impl Record for Profile {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("Profile")
                .field::<String>("bio")
                .field::<f64>("rating")
                .indexed()
                .build()
        });
        &SCHEMA
    }

    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("bio", &self.bio)?;
        w.field("rating", &self.rating)
    }

    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            bio: r.require("bio")?,
            rating: r.require("rating")?,
        })
    }
}

/// Flattened into `outer.*` properties
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

impl Address {
    pub fn new(street: &str, city: &str) -> Self {
        Self {
            street: street.to_string(),
            city: city.to_string(),
        }
    }
}

impl Record for Address {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("Address")
                .field::<String>("street")
                .field::<String>("city")
                .stored_as("town")
                .indexed()
                .build()
        });
        &SCHEMA
    }

    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("street", &self.street)?;
        w.field("city", &self.city)
    }

    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            street: r.require("street")?,
            city: r.require("city")?,
        })
    }
}

/// Element of a repeated flattened list
#[derive(Debug, Clone, PartialEq)]
pub struct Phone {
    pub label: String,
    pub number: String,
}

impl Phone {
    pub fn new(label: &str, number: &str) -> Self {
        Self {
            label: label.to_string(),
            number: number.to_string(),
        }
    }
}

impl Record for Phone {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("Phone")
                .field::<String>("label")
                .field::<String>("number")
                .build()
        });
        &SCHEMA
    }

    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("label", &self.label)?;
        w.field("number", &self.number)
    }

    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            label: r.require("label")?,
            number: r.require("number")?,
        })
    }
}

/// Stored as JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: String,
    pub tags: Vec<String>,
}

/// Exercises every field kind
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub key: Key,
    pub name: String,
    pub age: i32,
    pub active: bool,
    pub height: f64,
    pub avatar: Blob,
    pub created: DateTime<Utc>,
    pub birthday: NaiveDate,
    pub alarm: NaiveTime,
    pub home: GeoPoint,
    pub manager: Option<Key>,
    pub nickname: Option<String>,
    pub scores: Vec<i64>,
    pub aliases: Vec<Option<String>>,
    pub profile: Profile,
    pub address: Address,
    pub work: Option<Address>,
    pub phones: Vec<Phone>,
    pub prefs: Preferences,
    pub visits: i64,
}

impl Person {
    /// Length of `name`, stored but never read back
    pub fn name_len(&self) -> i64 {
        self.name.chars().count() as i64
    }
}

impl Record for Person {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("Person")
                .key("key")
                .field::<String>("name")
                .stored_as("n")
                .indexed()
                .field::<i32>("age")
                .indexed()
                .field::<bool>("active")
                .field::<f64>("height")
                .field::<Blob>("avatar")
                .field::<DateTime<Utc>>("created")
                .indexed()
                .field::<NaiveDate>("birthday")
                .field::<NaiveTime>("alarm")
                .field::<GeoPoint>("home")
                .field::<Option<Key>>("manager")
                .field::<Option<String>>("nickname")
                .field::<Vec<i64>>("scores")
                .indexed()
                .field::<Vec<Option<String>>>("aliases")
                .nested::<Profile>("profile")
                .structured::<Address>("address")
                .structured_opt::<Address>("work")
                .structured_list::<Phone>("phones")
                .json("prefs")
                .field::<i64>("visits")
                .optional()
                .computed::<i64>("name_len")
                .build()
        });
        &SCHEMA
    }

    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("key", &self.key)?;
        w.field("name", &self.name)?;
        w.field("age", &self.age)?;
        w.field("active", &self.active)?;
        w.field("height", &self.height)?;
        w.field("avatar", &self.avatar)?;
        w.field("created", &self.created)?;
        w.field("birthday", &self.birthday)?;
        w.field("alarm", &self.alarm)?;
        w.field("home", &self.home)?;
        w.field("manager", &self.manager)?;
        w.field("nickname", &self.nickname)?;
        w.field("scores", &self.scores)?;
        w.field("aliases", &self.aliases)?;
        w.nested("profile", &self.profile)?;
        w.structured("address", &self.address)?;
        w.structured_opt("work", self.work.as_ref())?;
        w.structured_list("phones", &self.phones)?;
        w.json("prefs", &self.prefs)?;
        w.field("visits", &self.visits)?;
        w.field("name_len", &self.name_len())
    }

    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            key: r.key()?,
            name: r.require("name")?,
            age: r.require("age")?,
            active: r.require("active")?,
            height: r.require("height")?,
            avatar: r.require("avatar")?,
            created: r.require("created")?,
            birthday: r.require("birthday")?,
            alarm: r.require("alarm")?,
            home: r.require("home")?,
            manager: r.require("manager")?,
            nickname: r.require("nickname")?,
            scores: r.require("scores")?,
            aliases: r.require("aliases")?,
            profile: r.nested("profile")?,
            address: r.structured("address")?,
            work: r.structured_opt("work")?,
            phones: r.structured_list("phones")?,
            prefs: r.json("prefs")?,
            visits: r.optional("visits")?.unwrap_or(1),
        })
    }
}

impl Model for Person {
    fn key(&self) -> &Key {
        &self.key
    }
}

/// A fully populated person
pub fn sample_person(id: i64) -> Person {
    Person {
        key: Key::with_id("Person", id),
        name: format!("Person {}", id),
        age: 30 + id as i32,
        active: id % 2 == 0,
        height: 1.75,
        avatar: Blob(vec![0, 1, 2, 255]),
        created: Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 15).unwrap(),
        birthday: NaiveDate::from_ymd_opt(1990, 7, 14).unwrap(),
        alarm: NaiveTime::from_hms_opt(6, 45, 0).unwrap(),
        home: GeoPoint::new(59.91, 10.75),
        manager: Some(Key::with_name("Person", "boss")),
        nickname: None,
        scores: vec![3, 1, 4],
        aliases: vec![Some("p".to_string()), None],
        profile: Profile {
            bio: "likes tests".to_string(),
            rating: 4.5,
        },
        address: Address::new("Main St 1", "Oslo"),
        work: Some(Address::new("Dock 5", "Bergen")),
        phones: vec![Phone::new("home", "111"), Phone::new("work", "222")],
        prefs: Preferences {
            theme: "dark".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        },
        visits: 7,
    }
}

/// Minimal keyed counter used by the transaction suites
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub key: Key,
    pub value: i64,
}

impl Counter {
    pub fn new(name: &str, value: i64) -> Self {
        Self {
            key: Key::with_name("Counter", name),
            value,
        }
    }
}

impl Record for Counter {
    fn schema() -> &'static Schema {
        static SCHEMA: Lazy<Schema> = Lazy::new(|| {
            Schema::builder("Counter")
                .key("key")
                .field::<i64>("value")
                .indexed()
                .build()
        });
        &SCHEMA
    }

    fn encode(&self, w: &mut EntityWriter) -> Result<()> {
        w.field("value", &self.value)
    }

    fn decode(r: &mut EntityReader) -> Result<Self> {
        Ok(Self {
            key: r.key()?,
            value: r.require("value")?,
        })
    }
}

impl Model for Counter {
    fn key(&self) -> &Key {
        &self.key
    }
}
