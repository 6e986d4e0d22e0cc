//! # Commands
//!
//! A `Command` is SQL text plus its bindings, borrowed against the connection
//! that will run it. Every execution prepares a `rusqlite::Statement`, binds,
//! steps and drops it before returning; only `execute_deferred_query` hands
//! the prepared statement to the caller inside a `DeferredQuery`.
//!
//! ## Binding
//!
//! ```text
//! cmd.bind(42)                 positional: ?1, ?2, ... in call order
//! cmd.bind_named(":name", "x") named: resolved with Statement::parameter_index
//! ```
//!
//! Positional bindings take consecutive indexes starting at 1 regardless of
//! how many named bindings are interleaved.
//!
//! ## Execution Modes
//!
//! | Method | Returns | Statement lifetime |
//! |--------|---------|--------------------|
//! | `execute_non_query` | rows changed | finalized before return |
//! | `execute_scalar` | first column of first row | finalized before return |
//! | `execute_query` | `Vec<T>` | finalized before return |
//! | `execute_rows` | `Vec<Row>` | finalized before return |
//! | `execute_deferred_query` | `DeferredQuery<T>` | until the `DeferredQuery` is dropped |

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::{ffi, Statement};
use smallvec::SmallVec;

use super::connection::Connection;
use super::convert;
use super::row::Row;
use crate::error::{OrmError, Result};
use crate::schema::{Record, TableMapping};
use crate::types::{FieldType, HostValue, OwnedValue};

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Option<String>,
    pub value: HostValue,
    pub index: usize,
}

pub struct Command<'conn> {
    conn: &'conn Connection,
    text: String,
    bindings: SmallVec<[Binding; 8]>,
}

impl<'conn> Command<'conn> {
    pub(crate) fn new(conn: &'conn Connection, text: impl Into<String>) -> Self {
        Self {
            conn,
            text: text.into(),
            bindings: SmallVec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Values of the bindings, in binding order.
    pub fn args(&self) -> Vec<&HostValue> {
        self.bindings.iter().map(|b| &b.value).collect()
    }

    pub fn bind<V: Into<OwnedValue>>(self, value: V) -> Self {
        self.bind_value(HostValue::Scalar(value.into()))
    }

    pub fn bind_value(mut self, value: HostValue) -> Self {
        self.bindings.push(Binding {
            name: None,
            value,
            index: 0,
        });
        self
    }

    pub fn bind_named<V: Into<OwnedValue>>(mut self, name: impl Into<String>, value: V) -> Self {
        self.bindings.push(Binding {
            name: Some(name.into()),
            value: HostValue::Scalar(value.into()),
            index: 0,
        });
        self
    }

    pub fn bind_all(mut self, values: &[OwnedValue]) -> Self {
        for value in values {
            self = self.bind(value.clone());
        }
        self
    }

    fn prepare(&mut self) -> Result<Statement<'conn>> {
        let conn: &'conn Connection = self.conn;
        conn.trace(&self.text);
        let mut stmt = conn.handle()?.prepare(&self.text)?;
        let ticks = conn.store_timestamps_as_ticks();

        let mut next_index = 1;
        for binding in self.bindings.iter_mut() {
            binding.index = match &binding.name {
                Some(name) => stmt.parameter_index(name)?.ok_or_else(|| OrmError::Execution {
                    code: ffi::SQLITE_RANGE,
                    message: format!("no parameter named {}", name),
                })?,
                None => {
                    let index = next_index;
                    next_index += 1;
                    index
                }
            };
            stmt.raw_bind_parameter(binding.index, convert::to_sql_host(&binding.value, ticks)?)?;
        }
        Ok(stmt)
    }

    /// Runs the statement to its first row or completion. A statement that
    /// yields rows (most pragmas) still counts as success.
    pub fn execute_non_query(&mut self) -> Result<usize> {
        let mut stmt = self.prepare()?;
        let mut rows = stmt.raw_query();
        rows.next()?;
        drop(rows);
        Ok(self.conn.changes())
    }

    /// First column of the first row, or the type's default when there is none.
    pub fn execute_scalar<V: FieldType>(&mut self) -> Result<V> {
        let mut stmt = self.prepare()?;
        let mut rows = stmt.raw_query();
        let value = match rows.next()? {
            Some(row) => convert::read_column(row.get_ref(0)?, V::data_type())?,
            None => OwnedValue::Null,
        };
        V::from_value(value)
    }

    pub fn execute_query<T: Record>(&mut self) -> Result<Vec<T>> {
        let mapping = self.conn.mapping::<T>()?;
        let mut stmt = self.prepare()?;
        let columns = column_map(&stmt, &mapping);
        let mut rows = stmt.raw_query();
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(materialize::<T>(row, &mapping, &columns)?);
        }
        Ok(records)
    }

    pub fn execute_deferred_query<T: Record>(mut self) -> Result<DeferredQuery<'conn, T>> {
        let mapping = self.conn.mapping::<T>()?;
        let stmt = self.prepare()?;
        let columns = column_map(&stmt, &mapping);
        Ok(DeferredQuery {
            stmt,
            mapping,
            columns,
            _marker: PhantomData,
        })
    }

    pub fn execute_rows(&mut self) -> Result<Vec<Row>> {
        let mut stmt = self.prepare()?;
        let names: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..names.len())
                .map(|i| row.get_ref(i).map(convert::read_dynamic))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(Row::new(Arc::clone(&names), values));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl std::fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)?;
        for binding in &self.bindings {
            write!(f, "\n  {} = {:?}", binding.index, binding.value)?;
        }
        Ok(())
    }
}

/// Position of each result column in the mapping, `None` when unmapped.
fn column_map(stmt: &Statement<'_>, mapping: &TableMapping) -> Vec<Option<usize>> {
    stmt.column_names()
        .into_iter()
        .map(|name| mapping.find_column_index(name))
        .collect()
}

fn materialize<T: Record>(row: &rusqlite::Row<'_>, mapping: &TableMapping, columns: &[Option<usize>]) -> Result<T> {
    let mut record = T::default();
    for (i, slot) in columns.iter().enumerate() {
        if let Some(index) = slot {
            let column = &mapping.columns()[*index];
            let value = convert::read_column(row.get_ref(i)?, column.data_type())?;
            column.assign(&mut record, value)?;
        }
    }
    Ok(record)
}

/// A prepared, bound query whose records are read on demand.
///
/// The statement stays prepared until the `DeferredQuery` is dropped. Each
/// call to [`iter`](Self::iter) runs it from the first row; the engine cursor
/// is reset when that iterator is exhausted, yields an error, or is dropped.
pub struct DeferredQuery<'conn, T> {
    stmt: Statement<'conn>,
    mapping: Arc<TableMapping>,
    columns: Vec<Option<usize>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> DeferredQuery<'_, T> {
    pub fn iter(&mut self) -> DeferredRows<'_, T> {
        DeferredRows {
            rows: Some(self.stmt.raw_query()),
            mapping: &self.mapping,
            columns: &self.columns,
            _marker: PhantomData,
        }
    }
}

impl<'q, T: Record> IntoIterator for &'q mut DeferredQuery<'_, T> {
    type Item = Result<T>;
    type IntoIter = DeferredRows<'q, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> std::fmt::Debug for DeferredQuery<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQuery")
            .field("table", &self.mapping.table_name())
            .field("sql", &self.stmt.expanded_sql())
            .finish()
    }
}

/// Streaming cursor over a [`DeferredQuery`].
pub struct DeferredRows<'q, T> {
    rows: Option<rusqlite::Rows<'q>>,
    mapping: &'q TableMapping,
    columns: &'q [Option<usize>],
    _marker: PhantomData<fn() -> T>,
}

impl<T> DeferredRows<'_, T> {
    pub fn is_finished(&self) -> bool {
        self.rows.is_none()
    }
}

impl<T: Record> Iterator for DeferredRows<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        let item = match rows.next() {
            Ok(Some(row)) => materialize::<T>(row, self.mapping, self.columns),
            Ok(None) => {
                self.rows = None;
                return None;
            }
            Err(err) => Err(err.into()),
        };
        if item.is_err() {
            self.rows = None;
        }
        Some(item)
    }
}
