//! # Database Module
//!
//! The connection and everything that runs against it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Connection                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ddl          create_table / drop_table / create_index / table_info    │
//! │   dml          insert / update / delete / find / get                    │
//! │   transaction  begin / savepoint / rollback / release / commit          │
//! │   command      SQL text + bindings → non-query, scalar, query, rows     │
//! │   prepared     cached insert SQL per record type, engine statement cache│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   convert      OwnedValue ⇄ engine storage classes                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - `builder`: `ConnectionBuilder` and `EncryptionKey`
//! - `connection`: `Connection`, its caches and lifecycle
//! - `command`: `Command`, `Binding`, `DeferredQuery`, `DeferredRows`
//! - `convert`: value codec and tick arithmetic
//! - `ddl`: schema creation and additive migration
//! - `dml`: record-level insert, update and delete
//! - `prepared`: `PreparedInsertCache`
//! - `row`: untyped `Row` and `ColumnInfo`
//! - `transaction`: nested transactions and `Savepoint`

mod builder;
mod command;
mod connection;
pub(crate) mod convert;
mod ddl;
mod dml;
mod prepared;
mod row;
mod transaction;

use std::os::raw::c_int;

use rusqlite::ffi;

pub use builder::{ConnectionBuilder, EncryptionKey, DEFAULT_BUSY_TIMEOUT, RAW_KEY_LEN};
pub use command::{Binding, Command, DeferredQuery, DeferredRows};
pub use connection::Connection;
pub use ddl::CreateTableResult;
pub use prepared::{insert_sql, InsertMode};
pub use row::{ColumnInfo, Row};
pub use transaction::Savepoint;

/// Extended result code for a NOT NULL constraint failure.
pub(crate) const SQLITE_CONSTRAINT_NOTNULL: c_int = ffi::SQLITE_CONSTRAINT | (5 << 8);
