//! # Transaction Integration Tests
//!
//! Nested transactions through `begin_transaction`, savepoints,
//! `run_in_transaction` and their failure paths.
//!
//! ## Requirements Tested
//!
//! - depth > 0 exactly while an engine transaction is open
//! - rolling back to a savepoint undoes only the work after it
//! - `run_in_transaction` releases on success, rolls back on error and panic
//! - malformed or stale savepoint tokens are rejected without side effects
//! - a savepoint the engine does not know leaves the open transaction usable
//!
//! ## Running Tests
//!
//! ```sh
//! cargo test --test transactions
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use tempfile::tempdir;
use turorm::{ColumnDef, Connection, OrmError, Record, TableDef};

#[derive(Debug, Default, Clone, PartialEq)]
struct Entry {
    id: i64,
    label: String,
}

impl Record for Entry {
    fn describe() -> TableDef<Self> {
        TableDef::<Self>::new("Entry")
            .field(ColumnDef::new("Id").primary_key().auto_increment(), |e| &e.id, |e| &mut e.id)
            .field(ColumnDef::new("Label"), |e| &e.label, |e| &mut e.label)
    }
}

fn entry(label: &str) -> Entry {
    Entry {
        id: 0,
        label: label.into(),
    }
}

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.create_table::<Entry>().unwrap();
    conn
}

fn labels(conn: &Connection) -> Vec<String> {
    conn.table::<Entry>()
        .unwrap()
        .to_list()
        .unwrap()
        .into_iter()
        .map(|e| e.label)
        .collect()
}

mod begin_commit_tests {
    use super::*;

    #[test]
    fn commit_persists_and_resets_depth() {
        let conn = setup();

        conn.begin_transaction().unwrap();
        assert!(conn.is_in_transaction());
        conn.insert(&mut entry("a")).unwrap();
        conn.commit().unwrap();

        assert_eq!(conn.transaction_depth(), 0);
        assert_eq!(labels(&conn), ["a"]);
    }

    #[test]
    fn rollback_discards_everything() {
        let conn = setup();

        conn.begin_transaction().unwrap();
        conn.insert(&mut entry("a")).unwrap();
        conn.rollback().unwrap();

        assert!(!conn.is_in_transaction());
        assert!(labels(&conn).is_empty());
    }

    #[test]
    fn begin_twice_is_a_state_error() {
        let conn = setup();
        conn.begin_transaction().unwrap();

        let err = conn.begin_transaction().unwrap_err();

        assert!(matches!(err, OrmError::TransactionState(_)));
        assert_eq!(conn.transaction_depth(), 1, "failed begin SHOULD not change depth");
        conn.rollback().unwrap();
    }

    #[test]
    fn commit_and_rollback_outside_transaction_are_no_ops() {
        let conn = setup();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert_eq!(conn.transaction_depth(), 0);
    }
}

mod savepoint_tests {
    use super::*;

    #[test]
    fn rollback_to_savepoint_keeps_earlier_work() {
        let conn = setup();
        conn.begin_transaction().unwrap();
        conn.insert(&mut entry("kept")).unwrap();

        let savepoint = conn.save_transaction_point().unwrap();
        assert_eq!(conn.transaction_depth(), 2);
        conn.insert(&mut entry("dropped")).unwrap();

        conn.rollback_to(&savepoint).unwrap();
        assert_eq!(conn.transaction_depth(), 1);
        conn.commit().unwrap();

        assert_eq!(labels(&conn), ["kept"]);
    }

    #[test]
    fn nested_savepoints_unwind_in_order() {
        let conn = setup();
        let outer = conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("one")).unwrap();
        let inner = conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("two")).unwrap();

        conn.release(&inner).unwrap();
        assert_eq!(conn.transaction_depth(), 1);
        assert_eq!(labels(&conn), ["one", "two"]);

        conn.rollback_to(&outer).unwrap();
        assert_eq!(conn.transaction_depth(), 0);
        assert!(labels(&conn).is_empty());
    }

    #[test]
    fn release_of_outermost_savepoint_commits() {
        let conn = setup();
        let savepoint = conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("a")).unwrap();

        conn.release(&savepoint).unwrap();

        assert!(!conn.is_in_transaction());
        assert_eq!(labels(&conn), ["a"]);
    }

    #[test]
    fn malformed_token_is_rejected() {
        let conn = setup();
        conn.begin_transaction().unwrap();

        for token in ["nonsense", "S1D", "S1D5", "X1D0"] {
            let err = conn.rollback_to(token).unwrap_err();
            assert!(matches!(err, OrmError::TransactionState(_)), "token {}", token);
        }
        assert_eq!(conn.transaction_depth(), 1);
        conn.rollback().unwrap();
    }

    #[test]
    fn stale_token_is_rejected() {
        let conn = setup();
        let savepoint = conn.save_transaction_point().unwrap();
        conn.release(&savepoint).unwrap();

        let err = conn.release(&savepoint).unwrap_err();
        assert!(matches!(err, OrmError::TransactionState(_)));
    }

    #[test]
    fn savepoint_from_an_earlier_transaction_leaves_the_current_one_intact() {
        let conn = setup();
        let earlier = conn.save_transaction_point().unwrap();
        conn.release(&earlier).unwrap();

        conn.begin_transaction().unwrap();
        conn.insert(&mut entry("current")).unwrap();
        let err = conn.rollback_to(&earlier).unwrap_err();

        assert!(matches!(err, OrmError::Execution { .. }), "got {:?}", err);
        assert_eq!(conn.transaction_depth(), 1, "depth SHOULD match the open transaction");
        conn.commit().unwrap();
        assert_eq!(labels(&conn), ["current"]);

        conn.begin_transaction().unwrap();
        conn.rollback().unwrap();
    }

    #[test]
    fn nested_savepoints_release_inside_out() {
        let conn = setup();
        let outer = conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("one")).unwrap();
        let inner = conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("two")).unwrap();

        conn.release(&inner).unwrap();
        assert_eq!(conn.transaction_depth(), 1);
        conn.release(&outer).unwrap();

        assert!(!conn.is_in_transaction());
        assert_eq!(labels(&conn), ["one", "two"]);
    }

    #[test]
    fn empty_token_rolls_back_everything() {
        let conn = setup();
        conn.begin_transaction().unwrap();
        conn.save_transaction_point().unwrap();
        conn.insert(&mut entry("a")).unwrap();

        conn.rollback_to("").unwrap();

        assert_eq!(conn.transaction_depth(), 0);
        assert!(labels(&conn).is_empty());
    }
}

mod run_in_transaction_tests {
    use super::*;

    #[test]
    fn success_releases_and_returns_value() {
        let conn = setup();

        let id = conn
            .run_in_transaction(|c| {
                let mut e = entry("a");
                c.insert(&mut e)?;
                Ok(e.id)
            })
            .unwrap();

        assert_eq!(id, 1);
        assert!(!conn.is_in_transaction());
        assert_eq!(labels(&conn), ["a"]);
    }

    #[test]
    fn error_rolls_back_to_savepoint() {
        let conn = setup();
        conn.begin_transaction().unwrap();
        conn.insert(&mut entry("outer")).unwrap();

        let result: turorm::Result<()> = conn.run_in_transaction(|c| {
            c.insert(&mut entry("inner"))?;
            Err(OrmError::NotFound("forced".into()))
        });

        assert!(matches!(result, Err(OrmError::NotFound(_))));
        assert_eq!(conn.transaction_depth(), 1, "outer transaction SHOULD stay open");
        conn.commit().unwrap();
        assert_eq!(labels(&conn), ["outer"]);
    }

    #[test]
    fn panic_rolls_back_to_savepoint() {
        let conn = setup();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: turorm::Result<()> = conn.run_in_transaction(|c| {
                c.insert(&mut entry("doomed"))?;
                panic!("boom");
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(conn.transaction_depth(), 0);
        assert!(labels(&conn).is_empty());
    }

    #[test]
    fn nested_runs_compose() {
        let conn = setup();

        conn.run_in_transaction(|c| {
            c.insert(&mut entry("a"))?;
            let inner: turorm::Result<()> = c.run_in_transaction(|c| {
                c.insert(&mut entry("b"))?;
                Err(OrmError::NotFound("inner fails".into()))
            });
            assert!(inner.is_err());
            c.insert(&mut entry("c"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(labels(&conn), ["a", "c"]);
    }
}

mod durability_tests {
    use super::*;

    #[test]
    fn uncommitted_work_is_lost_on_close() -> eyre::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tx.db");
        {
            let conn = Connection::open(&path)?;
            conn.create_table::<Entry>()?;
            conn.insert(&mut entry("committed"))?;
            conn.begin_transaction()?;
            conn.insert(&mut entry("pending"))?;
        }

        let conn = Connection::open(&path)?;
        assert_eq!(labels(&conn), ["committed"]);
        Ok(())
    }
}
