//! # turorm - Typed Object Mapping over SQLite
//!
//! turorm maps plain Rust records to SQLite tables. A record describes its
//! columns once; the crate derives the table schema from that description,
//! creates and migrates tables, inserts, updates and deletes records, and
//! compiles a small typed expression language into parameterized queries.
//!
//! - **No string SQL for common work**: DDL, DML and filtered selects are
//!   generated from the mapping
//! - **Values are always bound**: constants in predicates become `?`
//!   parameters, never inlined text
//! - **Nested transactions**: savepoints with rollback on error or panic
//!
//! ## Quick Start
//!
//! ```ignore
//! use turorm::{col, ColumnDef, Connection, Record, TableDef};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Record for Person {
//!     fn describe() -> TableDef<Self> {
//!         TableDef::<Self>::new("Person")
//!             .field(ColumnDef::new("Id").primary_key().auto_increment(), |p| &p.id, |p| &mut p.id)
//!             .field(ColumnDef::new("Name").indexed(), |p| &p.name, |p| &mut p.name)
//!             .field(ColumnDef::new("Age"), |p| &p.age, |p| &mut p.age)
//!     }
//! }
//!
//! let conn = Connection::open("./people.db")?;
//! conn.create_table::<Person>()?;
//!
//! let mut ann = Person { name: "Ann".into(), age: 31, ..Default::default() };
//! conn.insert(&mut ann)?;                      // ann.id now holds the rowid
//!
//! let adults = conn
//!     .table::<Person>()?
//!     .filter(col("Age").ge(18))
//!     .order_by_desc(col("Name"))?
//!     .take(10)
//!     .to_list()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   TableQuery / Selected / Joined    │  sql::query
//! ├─────────────────────────────────────┤
//! │  ExpressionCompiler   │    Expr     │  sql::compiler, sql::expr
//! ├─────────────────────────────────────┤
//! │ Connection: DDL, DML, transactions  │  database
//! ├─────────────────────────────────────┤
//! │ MappingCatalog │ TableMapping │ Rec │  schema
//! ├─────────────────────────────────────┤
//! │  Command │ PreparedInsert │ Codec   │  database::{command, prepared, convert}
//! ├─────────────────────────────────────┤
//! │        rusqlite (bundled SQLite)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: `DataType`, `OwnedValue`, `HostValue`, `FieldType`, `Decimal`
//! - [`schema`]: `Record`, `TableDef`, `ColumnDef`, `TableMapping`, `MappingCatalog`
//! - [`sql`]: expression DSL, compiler, query builder
//! - [`database`]: `Connection`, `Command`, transactions, DDL/DML
//! - [`error`]: `OrmError` and `Result`
//!
//! ## Logging
//!
//! The crate logs through `tracing`. Every statement is emitted at `debug`
//! level on the `turorm::sql` target before it runs; connection open/close
//! are `info`; best-effort cleanup failures are `warn`.

#[macro_use]
mod macros;

pub mod database;
pub mod error;
pub mod schema;
pub mod sql;
pub mod types;

pub use database::{
    Command, Connection, ConnectionBuilder, CreateTableResult, DeferredQuery, DeferredRows, EncryptionKey,
    InsertMode, Row, Savepoint,
};
pub use error::{OrmError, Result};
pub use schema::{ColumnDef, CreateFlags, Record, TableDef, TableMapping};
pub use sql::{col, lit, Expr, TableQuery};
pub use types::{DataType, FieldType, HostValue, OwnedValue};
