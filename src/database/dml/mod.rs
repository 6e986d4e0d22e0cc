//! # DML Operations Module
//!
//! Record-level INSERT, UPDATE and DELETE, plus primary-key lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DML Operation Flow                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   &T / &mut T                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   Connection::mapping::<T>()      cached Arc<TableMapping>              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   Column::value_of(record)        values in mapping order               │
//! │       │                                                                 │
//! │       ├── insert ──► PreparedInsertCache (one statement per type)       │
//! │       └── update / delete ──► Command (prepared per call)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   rows changed; auto-increment key written back after insert            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - `insert`: `insert`, `insert_or_replace`, `insert_with`, `insert_all`
//! - `update`: `update`, `update_all`
//! - `delete`: `delete`, `delete_by_key`, `delete_all`
//!
//! `find` and `get` live here.
//!
//! ## NOT NULL Violations
//!
//! Insert and update failures with the engine's NOT NULL constraint code come
//! back as `OrmError::NotNullConstraintViolation` carrying the mapping and the
//! record's column values, so callers can ask which columns were null.

mod delete;
mod insert;
mod update;

use super::connection::Connection;
use crate::error::{OrmError, Result};
use crate::schema::Record;
use crate::types::OwnedValue;

impl Connection {
    /// Record with primary key `key`, or `None`.
    ///
    /// A table without a primary key returns its first row.
    pub fn find<T: Record>(&self, key: impl Into<OwnedValue>) -> Result<Option<T>> {
        let mapping = self.mapping::<T>()?;
        let mut command = self.create_command(mapping.get_by_primary_key_sql());
        if mapping.pk().is_some() {
            command = command.bind(key);
        }
        Ok(command.execute_query::<T>()?.into_iter().next())
    }

    /// Like `find`, but a missing row is `OrmError::NotFound`.
    pub fn get<T: Record>(&self, key: impl Into<OwnedValue>) -> Result<T> {
        let key = key.into();
        let shown = key.display_string();
        self.find::<T>(key)?.ok_or_else(|| {
            let table = self
                .mapping::<T>()
                .map(|m| m.table_name().to_string())
                .unwrap_or_else(|_| std::any::type_name::<T>().to_string());
            OrmError::NotFound(format!("no row in {} with primary key {}", table, shown))
        })
    }
}
