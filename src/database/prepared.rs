//! # Prepared Insert Statements
//!
//! Inserting is the hot path of a mapper, so each record type keeps its
//! insert SQL, and the statement itself lives in rusqlite's prepared
//! statement cache for the lifetime of the connection.
//!
//! ## Overview
//!
//! ```text
//! insert(&mut record)
//!     │
//!     ▼
//! PreparedInsertCache[TypeId]      one entry per record type
//!     │   mode differs? ──► regenerate the SQL
//!     ▼
//! PreparedInsertCommand { mode, sql }
//!     │
//!     ▼
//! prepare_cached(sql) ──► bind (mapping order) ──► raw_execute
//!                         (statement returns to the cache on drop)
//! ```
//!
//! ## Invalidation
//!
//! - `drop_table::<T>()` removes `T`'s entry and flushes the statement cache
//! - `Connection::close` sweeps every entry and flushes the statement cache
//!   before closing the handle
//!
//! ## SQL Shapes
//!
//! ```text
//! insert into "T"("a","b") values (?,?)
//! insert or replace into "T"("a","b") values (?,?)
//! insert into "T" default values          (only column is the auto-increment key)
//! ```

use std::any::TypeId;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::connection::Connection;
use super::convert;
use crate::error::Result;
use crate::schema::TableMapping;
use crate::sql::quote_identifier;
use crate::types::OwnedValue;

/// Conflict behavior of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InsertMode {
    #[default]
    Plain,
    Replace,
}

impl InsertMode {
    fn keyword(self) -> &'static str {
        match self {
            InsertMode::Plain => "insert into",
            InsertMode::Replace => "insert or replace into",
        }
    }
}

/// Insert SQL for `mapping` under `mode`.
pub fn insert_sql(mapping: &TableMapping, mode: InsertMode) -> String {
    let columns = match mode {
        InsertMode::Plain => mapping.insert_columns(),
        InsertMode::Replace => mapping.insert_or_replace_columns(),
    };
    let table = quote_identifier(mapping.table_name());

    let only_auto_inc = mapping.columns().len() == 1 && mapping.columns()[0].is_auto_inc();
    if columns.is_empty() && only_auto_inc {
        return format!("{} {} default values", mode.keyword(), table);
    }

    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c.name())).collect();
    let placeholders = vec!["?"; columns.len()].join(",");
    format!(
        "{} {}({}) values ({})",
        mode.keyword(),
        table,
        names.join(","),
        placeholders
    )
}

#[derive(Debug, Clone)]
pub(crate) struct PreparedInsertCommand {
    mode: InsertMode,
    sql: Arc<str>,
}

impl PreparedInsertCommand {
    pub(crate) fn new(mapping: &TableMapping, mode: InsertMode) -> Self {
        Self {
            mode,
            sql: insert_sql(mapping, mode).into(),
        }
    }

    pub(crate) fn mode(&self) -> InsertMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn execute(&self, conn: &Connection, values: &[OwnedValue]) -> Result<usize> {
        conn.trace(&self.sql);
        let mut stmt = conn.handle()?.prepare_cached(&self.sql)?;
        let ticks = conn.store_timestamps_as_ticks();
        for (i, value) in values.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, convert::to_sql(value, ticks)?)?;
        }
        Ok(stmt.raw_execute()?)
    }
}

pub(crate) struct PreparedInsertCache {
    commands: Mutex<HashMap<TypeId, PreparedInsertCommand>>,
}

impl PreparedInsertCache {
    pub(crate) fn new() -> Self {
        Self {
            commands: Mutex::new(HashMap::new()),
        }
    }

    /// The insert command for `mapping`'s record type under `mode`.
    pub(crate) fn command(&self, mapping: &TableMapping, mode: InsertMode) -> PreparedInsertCommand {
        let mut commands = self.commands.lock();
        let command = commands
            .entry(mapping.record_type())
            .or_insert_with(|| PreparedInsertCommand::new(mapping, mode));
        if command.mode() != mode {
            debug!(table = mapping.table_name(), ?mode, "regenerating insert command");
            *command = PreparedInsertCommand::new(mapping, mode);
        }
        command.clone()
    }

    pub(crate) fn execute(
        &self,
        conn: &Connection,
        mapping: &TableMapping,
        mode: InsertMode,
        values: &[OwnedValue],
    ) -> Result<usize> {
        self.command(mapping, mode).execute(conn, values)
    }

    pub(crate) fn invalidate(&self, record_type: TypeId) -> bool {
        self.commands.lock().remove(&record_type).is_some()
    }

    /// Drops every cached command; returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let mut commands = self.commands.lock();
        let swept = commands.len();
        commands.clear();
        swept
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.commands.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, CreateFlags, Record, TableDef};

    #[derive(Debug, Default)]
    struct Note {
        id: i64,
        body: String,
        pinned: bool,
    }

    impl Record for Note {
        fn describe() -> TableDef<Self> {
            TableDef::<Self>::new("Note")
                .field(ColumnDef::new("Id").primary_key().auto_increment(), |n| &n.id, |n| &mut n.id)
                .field(ColumnDef::new("Body"), |n| &n.body, |n| &mut n.body)
                .field(ColumnDef::new("Pinned"), |n| &n.pinned, |n| &mut n.pinned)
        }
    }

    #[derive(Debug, Default)]
    struct Tick {
        id: i64,
    }

    impl Record for Tick {
        fn describe() -> TableDef<Self> {
            TableDef::<Self>::new("Tick").field(ColumnDef::new("Id").primary_key().auto_increment(), |t| &t.id, |t| &mut t.id)
        }
    }

    #[test]
    fn plain_insert_skips_auto_increment_key() {
        let mapping = TableMapping::build::<Note>(CreateFlags::NONE).unwrap();
        assert_eq!(
            insert_sql(&mapping, InsertMode::Plain),
            "insert into \"Note\"(\"Body\",\"Pinned\") values (?,?)"
        );
    }

    #[test]
    fn replace_binds_every_column() {
        let mapping = TableMapping::build::<Note>(CreateFlags::NONE).unwrap();
        assert_eq!(
            insert_sql(&mapping, InsertMode::Replace),
            "insert or replace into \"Note\"(\"Id\",\"Body\",\"Pinned\") values (?,?,?)"
        );
    }

    #[test]
    fn mode_change_regenerates_the_command() {
        let mapping = TableMapping::build::<Note>(CreateFlags::NONE).unwrap();
        let cache = PreparedInsertCache::new();

        let plain = cache.command(&mapping, InsertMode::Plain);
        let replace = cache.command(&mapping, InsertMode::Replace);

        assert!(plain.sql().starts_with("insert into"));
        assert!(replace.sql().starts_with("insert or replace into"));
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(mapping.record_type()));
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn lone_auto_increment_key_uses_default_values() {
        let mapping = TableMapping::build::<Tick>(CreateFlags::NONE).unwrap();
        assert_eq!(
            insert_sql(&mapping, InsertMode::Plain),
            "insert into \"Tick\" default values"
        );
    }
}
