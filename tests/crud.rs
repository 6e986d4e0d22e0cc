//! # Record Persistence Integration Tests
//!
//! End-to-end tests for inserting, reading, updating and deleting mapped
//! records through the public `Connection` API.
//!
//! ## Test Categories
//!
//! 1. **Insert**: auto-increment write-back, generated UUID keys, replace
//! 2. **Lookup**: `find` / `get` by primary key
//! 3. **Update / Delete**: by record, by key, whole table
//! 4. **Types**: timestamps, durations, offsets, decimals, enums, blobs
//! 5. **Constraints**: NOT NULL violations carry the offending record
//! 6. **Persistence**: data survives close and reopen
//!
//! ## Running Tests
//!
//! ```sh
//! cargo test --test crud
//! ```

use std::sync::Once;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use tempfile::tempdir;
use turorm::types::Decimal;
use turorm::{ColumnDef, Connection, InsertMode, OrmError, Record, TableDef};
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    id: i64,
    name: String,
    age: i32,
    email: Option<String>,
}

impl Record for Person {
    fn describe() -> TableDef<Self> {
        TableDef::<Self>::new("Person")
            .field(ColumnDef::new("Id").primary_key().auto_increment(), |p| &p.id, |p| &mut p.id)
            .field(ColumnDef::new("Name").indexed(), |p| &p.name, |p| &mut p.name)
            .field(ColumnDef::new("Age"), |p| &p.age, |p| &mut p.age)
            .field(ColumnDef::new("Email"), |p| &p.email, |p| &mut p.email)
    }
}

fn person(name: &str, age: i32) -> Person {
    Person {
        name: name.into(),
        age,
        ..Default::default()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Document {
    id: Uuid,
    title: String,
}

impl Record for Document {
    fn describe() -> TableDef<Self> {
        TableDef::<Self>::new("Document")
            .field(ColumnDef::new("Id").primary_key().auto_increment(), |d| &d.id, |d| &mut d.id)
            .field(ColumnDef::new("Title"), |d| &d.title, |d| &mut d.title)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Status {
    #[default]
    Draft,
    Published,
    Archived = 9,
}

turorm::enum_field!(Status { Draft, Published, Archived });

#[derive(Debug, Default, Clone, PartialEq)]
struct Event {
    id: i64,
    at: NaiveDateTime,
    length: TimeDelta,
    stamped: DateTime<FixedOffset>,
    price: Decimal,
    status: Status,
    payload: Vec<u8>,
    done: bool,
}

impl Record for Event {
    fn describe() -> TableDef<Self> {
        TableDef::<Self>::new("Event")
            .field(ColumnDef::new("Id").primary_key(), |e| &e.id, |e| &mut e.id)
            .field(ColumnDef::new("At"), |e| &e.at, |e| &mut e.at)
            .field(ColumnDef::new("Length"), |e| &e.length, |e| &mut e.length)
            .field(ColumnDef::new("Stamped"), |e| &e.stamped, |e| &mut e.stamped)
            .field(ColumnDef::new("Price"), |e| &e.price, |e| &mut e.price)
            .field(ColumnDef::new("Status"), |e| &e.status, |e| &mut e.status)
            .field(ColumnDef::new("Payload"), |e| &e.payload, |e| &mut e.payload)
            .field(ColumnDef::new("Done"), |e| &e.done, |e| &mut e.done)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Account {
    id: i64,
    login: Option<String>,
}

impl Record for Account {
    fn describe() -> TableDef<Self> {
        TableDef::<Self>::new("Account")
            .field(ColumnDef::new("Id").primary_key().auto_increment(), |a| &a.id, |a| &mut a.id)
            .field(ColumnDef::new("Login").not_null(), |a| &a.login, |a| &mut a.login)
    }
}

static TRACING: Once = Once::new();

/// Routes the crate's `tracing` output to the test harness; `RUST_LOG=turorm::sql=debug`
/// shows every statement.
fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

fn people_db() -> Connection {
    init_tracing();
    let conn = Connection::open_in_memory().unwrap();
    conn.create_table::<Person>().unwrap();
    conn
}

mod insert_tests {
    use super::*;

    #[test]
    fn insert_writes_back_auto_increment_key() {
        let conn = people_db();
        let mut ann = person("Ann", 31);
        let mut bob = person("Bob", 45);

        assert_eq!(conn.insert(&mut ann).unwrap(), 1);
        assert_eq!(conn.insert(&mut bob).unwrap(), 1);

        assert_eq!(ann.id, 1, "first rowid SHOULD be written into the key");
        assert_eq!(bob.id, 2);
    }

    #[test]
    fn insert_assigns_uuid_to_nil_identifier() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Document>().unwrap();

        let mut doc = Document {
            title: "notes".into(),
            ..Default::default()
        };
        conn.insert(&mut doc).unwrap();

        assert!(!doc.id.is_nil(), "nil identifier SHOULD be replaced before insert");
        let loaded: Document = conn.get(doc.id).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn explicit_identifier_is_kept() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Document>().unwrap();
        let id = Uuid::new_v4();

        let mut doc = Document {
            id,
            title: "fixed".into(),
        };
        conn.insert(&mut doc).unwrap();

        assert_eq!(doc.id, id);
    }

    #[test]
    fn insert_or_replace_overwrites_existing_row() {
        let conn = people_db();
        let mut ann = person("Ann", 31);
        conn.insert(&mut ann).unwrap();

        let mut older = Person { age: 32, ..ann.clone() };
        conn.insert_with(&mut older, InsertMode::Replace).unwrap();

        let all = conn.query::<Person>("select * from \"Person\"", &[]).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].age, 32);
    }

    #[test]
    fn insert_all_in_transaction_rolls_back_on_failure() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Account>().unwrap();

        let mut accounts = vec![
            Account { id: 0, login: Some("a".into()) },
            Account { id: 0, login: None },
        ];
        let err = conn.insert_all(&mut accounts, true).unwrap_err();

        assert!(matches!(err, OrmError::NotNullConstraintViolation { .. }));
        let count: i64 = conn.execute_scalar("select count(*) from \"Account\"", &[]).unwrap();
        assert_eq!(count, 0, "failed batch SHOULD leave no rows behind");
        assert!(!conn.is_in_transaction());
    }

    #[test]
    fn insert_all_returns_total_changes() {
        let conn = people_db();
        let mut people: Vec<Person> = (0..5).map(|i| person(&format!("p{}", i), i)).collect();

        assert_eq!(conn.insert_all(&mut people, true).unwrap(), 5);
        assert_eq!(people.iter().map(|p| p.id).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    }
}

mod lookup_tests {
    use super::*;

    #[test]
    fn get_round_trips_every_column() {
        let conn = people_db();
        let mut ann = Person {
            email: Some("ann@example.com".into()),
            ..person("Ann", 31)
        };
        conn.insert(&mut ann).unwrap();

        let loaded: Person = conn.get(ann.id).unwrap();

        assert_eq!(loaded, ann);
    }

    #[test]
    fn find_returns_none_for_missing_key() {
        let conn = people_db();
        assert_eq!(conn.find::<Person>(42).unwrap(), None);
    }

    #[test]
    fn get_reports_not_found() {
        let conn = people_db();
        let err = conn.get::<Person>(42).unwrap_err();
        assert!(matches!(err, OrmError::NotFound(_)), "got {:?}", err);
    }
}

mod update_delete_tests {
    use super::*;

    #[test]
    fn update_writes_non_key_columns() {
        let conn = people_db();
        let mut ann = person("Ann", 31);
        conn.insert(&mut ann).unwrap();

        ann.age = 40;
        ann.email = Some("new@example.com".into());
        assert_eq!(conn.update(&ann).unwrap(), 1);

        assert_eq!(conn.get::<Person>(ann.id).unwrap(), ann);
    }

    #[test]
    fn update_of_missing_row_changes_nothing() {
        let conn = people_db();
        let ghost = Person {
            id: 99,
            ..person("Ghost", 1)
        };
        assert_eq!(conn.update(&ghost).unwrap(), 0);
    }

    #[test]
    fn update_all_sums_changes() {
        let conn = people_db();
        let mut people = vec![person("A", 1), person("B", 2)];
        conn.insert_all(&mut people, false).unwrap();

        for p in &mut people {
            p.age += 10;
        }
        assert_eq!(conn.update_all(&people, true).unwrap(), 2);
        assert_eq!(conn.get::<Person>(people[1].id).unwrap().age, 12);
    }

    #[test]
    fn delete_by_record_and_key() {
        let conn = people_db();
        let mut people = vec![person("A", 1), person("B", 2), person("C", 3)];
        conn.insert_all(&mut people, false).unwrap();

        assert_eq!(conn.delete(&people[0]).unwrap(), 1);
        assert_eq!(conn.delete_by_key::<Person>(people[1].id).unwrap(), 1);
        assert_eq!(conn.delete_by_key::<Person>(1000).unwrap(), 0);

        let remaining = conn.table::<Person>().unwrap().to_list().unwrap();
        assert_eq!(remaining, vec![people[2].clone()]);
    }

    #[test]
    fn delete_all_empties_table() {
        let conn = people_db();
        let mut people = vec![person("A", 1), person("B", 2)];
        conn.insert_all(&mut people, false).unwrap();

        assert_eq!(conn.delete_all::<Person>().unwrap(), 2);
        assert_eq!(conn.table::<Person>().unwrap().count().unwrap(), 0);
    }
}

mod type_tests {
    use super::*;

    fn sample_event() -> Event {
        let at = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 45, 10, 123_456)
            .unwrap();
        Event {
            id: 7,
            at,
            length: TimeDelta::milliseconds(90_500),
            stamped: DateTime::parse_from_rfc3339("2024-02-29T15:45:10+02:00").unwrap(),
            price: Decimal::new(1999, 2),
            status: Status::Archived,
            payload: vec![0, 1, 2, 255],
            done: true,
        }
    }

    #[test]
    fn every_supported_type_round_trips_with_ticks() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Event>().unwrap();
        let mut event = sample_event();
        conn.insert(&mut event).unwrap();

        let loaded: Event = conn.get(7).unwrap();

        assert_eq!(loaded.at, event.at);
        assert_eq!(loaded.length, event.length);
        assert_eq!(loaded.stamped, event.stamped, "instants SHOULD compare equal");
        assert_eq!(loaded.stamped.offset().local_minus_utc(), 0, "offsets SHOULD read back as UTC");
        assert_eq!(loaded.price, event.price);
        assert_eq!(loaded.status, Status::Archived);
        assert_eq!(loaded.payload, event.payload);
        assert!(loaded.done);
    }

    #[test]
    fn text_timestamps_round_trip() {
        let conn = Connection::builder()
            .in_memory()
            .store_timestamps_as_ticks(false)
            .open()
            .unwrap();
        conn.create_table::<Event>().unwrap();
        let mut event = sample_event();
        conn.insert(&mut event).unwrap();

        let raw: String = conn
            .execute_scalar("select \"At\" from \"Event\" where \"Id\" = 7", &[])
            .unwrap();
        assert_eq!(raw, "2024-02-29T13:45:10.123456000");
        assert_eq!(conn.get::<Event>(7).unwrap().at, event.at);
    }

    #[test]
    fn ticks_are_stored_as_integers() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Event>().unwrap();
        let mut event = Event {
            at: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            ..sample_event()
        };
        conn.insert(&mut event).unwrap();

        let ticks: i64 = conn.execute_scalar("select \"At\" from \"Event\"", &[]).unwrap();
        assert_eq!(ticks, 630_822_816_000_000_000);
    }
}

mod constraint_tests {
    use super::*;

    #[test]
    fn not_null_violation_reports_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Account>().unwrap();

        let mut account = Account { id: 0, login: None };
        let err = conn.insert(&mut account).unwrap_err();

        let columns: Vec<_> = err.not_null_columns().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(columns, ["Login"]);
        assert!(matches!(
            err,
            OrmError::NotNullConstraintViolation { mapping: Some(_), record: Some(_), .. }
        ));
    }

    #[test]
    fn unique_index_rejects_duplicates() {
        #[derive(Debug, Default)]
        struct Tag {
            id: i64,
            label: String,
        }

        impl Record for Tag {
            fn describe() -> TableDef<Self> {
                TableDef::<Self>::new("Tag")
                    .field(ColumnDef::new("Id").primary_key().auto_increment(), |t| &t.id, |t| &mut t.id)
                    .field(ColumnDef::new("Label").unique(), |t| &t.label, |t| &mut t.label)
            }
        }

        let conn = Connection::open_in_memory().unwrap();
        conn.create_table::<Tag>().unwrap();
        conn.insert(&mut Tag { id: 0, label: "x".into() }).unwrap();

        let err = conn.insert(&mut Tag { id: 0, label: "x".into() }).unwrap_err();

        assert_eq!(err.primary_code(), Some(rusqlite::ffi::SQLITE_CONSTRAINT));
    }
}

mod persistence_tests {
    use super::*;

    #[test]
    fn records_survive_reopen() -> eyre::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("people.db");

        let mut ann = person("Ann", 31);
        {
            let conn = Connection::open(&path)?;
            conn.create_table::<Person>()?;
            conn.insert(&mut ann)?;
        }

        let conn = Connection::open(&path)?;
        let loaded: Person = conn.get(ann.id)?;
        assert_eq!(loaded, ann);
        Ok(())
    }
}
