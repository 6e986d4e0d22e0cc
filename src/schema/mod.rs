//! # Schema Mapping
//!
//! This module turns record types into table metadata.
//!
//! ## Architecture
//!
//! ```text
//! Record::describe()            declaration (TableDef<T> + ColumnDef)
//!        │
//!        ▼
//! TableMapping::build(flags)    resolved columns, key, indexes, SQL fragments
//!        │
//!        ▼
//! MappingCatalog                per-connection memo keyed by TypeId
//! ```
//!
//! ## Module Structure
//!
//! - `table`: the declaration side (`Record`, `TableDef`, `ColumnDef`, `Constraint`)
//! - `mapping`: the resolved side (`TableMapping`, `Column`, `CreateFlags`)
//! - `catalog`: `MappingCatalog`
//!
//! ## Concurrency
//!
//! Mappings are immutable after build apart from lazily computed insert
//! column sets, and are shared as `Arc<TableMapping>`. The catalog guards its
//! map with a `parking_lot::Mutex`.

pub mod catalog;
pub mod mapping;
pub mod table;

pub use catalog::MappingCatalog;
pub use mapping::{Column, CreateFlags, TableMapping, IMPLICIT_INDEX_SUFFIX, IMPLICIT_PK_NAME};
pub use table::{ColumnDef, Constraint, IndexedAttr, Record, TableDef};
