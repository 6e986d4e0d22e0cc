//! # INSERT Operation Module
//!
//! ```text
//! insert_with(&mut record, mode)
//!     │
//!     ├── auto-identifier key nil/NULL ──► Uuid::new_v4() written into record
//!     │
//!     ├── values of insert_columns (Plain) or insert_or_replace_columns (Replace)
//!     │
//!     ├── PreparedInsertCache::execute   bind ─► step ─► reset
//!     │
//!     └── changed > 0 and auto-increment key ──► last_insert_rowid written back
//! ```
//!
//! `insert_all` optionally wraps the batch in `run_in_transaction`, so a
//! failing record rolls back every record inserted before it.

use uuid::Uuid;

use crate::database::connection::Connection;
use crate::database::prepared::InsertMode;
use crate::error::Result;
use crate::schema::{Record, TableMapping};
use crate::types::OwnedValue;

impl Connection {
    pub fn insert<T: Record>(&self, record: &mut T) -> Result<usize> {
        self.insert_with(record, InsertMode::Plain)
    }

    pub fn insert_or_replace<T: Record>(&self, record: &mut T) -> Result<usize> {
        self.insert_with(record, InsertMode::Replace)
    }

    pub fn insert_with<T: Record>(&self, record: &mut T, mode: InsertMode) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        assign_identifier(&mapping, record)?;

        let columns = match mode {
            InsertMode::Plain => mapping.insert_columns(),
            InsertMode::Replace => mapping.insert_or_replace_columns(),
        };
        let values = columns
            .iter()
            .map(|column| column.value_of(record))
            .collect::<Result<Vec<_>>>()?;

        let changed = self
            .insert_commands
            .execute(self, &mapping, mode, &values)
            .map_err(|err| err.attach_record(&mapping, record))?;

        if changed > 0 && mapping.has_auto_inc_pk() {
            if let Some(pk) = mapping.pk() {
                pk.assign(record, OwnedValue::Int(self.last_insert_rowid()))?;
            }
        }
        Ok(changed)
    }

    /// Inserts every record; returns the total rows changed.
    pub fn insert_all<T: Record>(&self, records: &mut [T], run_in_transaction: bool) -> Result<usize> {
        let mut insert_each = |conn: &Connection| {
            let mut changed = 0;
            for record in records.iter_mut() {
                changed += conn.insert(record)?;
            }
            Ok(changed)
        };
        if run_in_transaction {
            self.run_in_transaction(insert_each)
        } else {
            insert_each(self)
        }
    }
}

fn assign_identifier<T: Record>(mapping: &TableMapping, record: &mut T) -> Result<()> {
    let Some(pk) = mapping.pk().filter(|pk| pk.is_auto_guid()) else {
        return Ok(());
    };
    let unset = match pk.value_of(record)? {
        OwnedValue::Null => true,
        OwnedValue::Uuid(id) => id.is_nil(),
        _ => false,
    };
    if unset {
        pk.assign(record, OwnedValue::Uuid(Uuid::new_v4()))?;
    }
    Ok(())
}
