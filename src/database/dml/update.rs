//! # UPDATE Operation Module
//!
//! Updates a record by primary key:
//!
//! ```text
//! update "T" set "a" = ?, "b" = ? where "pk" = ?
//! ```
//!
//! Every non-key column is written. A table whose only column is the key
//! writes the key itself. Tables without a primary key cannot be updated.

use crate::database::connection::Connection;
use crate::error::{OrmError, Result};
use crate::schema::{Column, Record, TableMapping};
use crate::sql::quote_identifier;

/// The update statement and the columns it binds, in binding order.
fn update_plan(mapping: &TableMapping) -> Result<(String, Vec<&Column>)> {
    let pk = mapping.pk().ok_or_else(|| {
        OrmError::Schema(format!(
            "cannot update {}: it has no primary key",
            mapping.table_name()
        ))
    })?;

    let mut columns: Vec<&Column> = mapping.columns().iter().filter(|c| !c.is_pk()).collect();
    if columns.is_empty() {
        columns.push(pk);
    }

    let assignments: Vec<String> = columns
        .iter()
        .map(|c| format!("{} = ?", quote_identifier(c.name())))
        .collect();
    let sql = format!(
        "update {} set {} where {} = ?",
        quote_identifier(mapping.table_name()),
        assignments.join(", "),
        quote_identifier(pk.name())
    );

    columns.push(pk);
    Ok((sql, columns))
}

impl Connection {
    pub fn update<T: Record>(&self, record: &T) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let (sql, columns) = update_plan(&mapping)?;
        let values = columns
            .iter()
            .map(|column| column.value_of(record))
            .collect::<Result<Vec<_>>>()?;

        self.create_command(sql)
            .bind_all(&values)
            .execute_non_query()
            .map_err(|err| err.attach_record(&mapping, record))
    }

    pub fn update_all<T: Record>(&self, records: &[T], run_in_transaction: bool) -> Result<usize> {
        let update_each = |conn: &Connection| {
            let mut changed = 0;
            for record in records {
                changed += conn.update(record)?;
            }
            Ok(changed)
        };
        if run_in_transaction {
            self.run_in_transaction(update_each)
        } else {
            update_each(self)
        }
    }
}
