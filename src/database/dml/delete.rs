//! # DELETE Operation Module
//!
//! ```text
//! delete(&record)        delete from "T" where "pk" = ?   (key read from record)
//! delete_by_key::<T>(k)  delete from "T" where "pk" = ?
//! delete_all::<T>()      delete from "T"
//! ```
//!
//! Filtered deletes go through `TableQuery::delete`.

use crate::database::connection::Connection;
use crate::error::{OrmError, Result};
use crate::schema::{Column, Record, TableMapping};
use crate::sql::quote_identifier;
use crate::types::OwnedValue;

fn delete_by_pk_sql(mapping: &TableMapping) -> Result<(String, &Column)> {
    let pk = mapping.pk().ok_or_else(|| {
        OrmError::Schema(format!(
            "cannot delete from {} by key: it has no primary key",
            mapping.table_name()
        ))
    })?;
    let sql = format!(
        "delete from {} where {} = ?",
        quote_identifier(mapping.table_name()),
        quote_identifier(pk.name())
    );
    Ok((sql, pk))
}

impl Connection {
    pub fn delete<T: Record>(&self, record: &T) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let (sql, pk) = delete_by_pk_sql(&mapping)?;
        let key = pk.value_of(record)?;
        self.execute(&sql, &[key])
    }

    pub fn delete_by_key<T: Record>(&self, key: impl Into<OwnedValue>) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let (sql, _) = delete_by_pk_sql(&mapping)?;
        self.execute(&sql, &[key.into()])
    }

    /// Deletes every row of `T`'s table.
    pub fn delete_all<T: Record>(&self) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        self.execute(
            &format!("delete from {}", quote_identifier(mapping.table_name())),
            &[],
        )
    }
}
