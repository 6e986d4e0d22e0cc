//! # DDL Operations
//!
//! Table and index management driven by mappings.
//!
//! ## create_table
//!
//! ```text
//! pragma table_info("T")
//!     │
//!     ├── no columns ──► create table if not exists "T"(decl, ...) [without rowid]
//!     │                  → CreateTableResult::Created
//!     │
//!     └── columns ─────► alter table "T" add column <decl>   (each missing column)
//!                        → CreateTableResult::Migrated
//!     │
//!     ▼
//! create [unique] index if not exists "<name>" on "T"("c1", "c2", ...)
//! ```
//!
//! Migration is additive only: existing columns are matched case-insensitively
//! and never dropped or retyped.
//!
//! ## Index Grouping
//!
//! Index declarations are grouped by name (default `<table>_<column>`) in
//! first-seen order; columns within a group are sorted by declared order.
//! Every column of a group must agree on uniqueness.

use std::any::TypeId;

use smallvec::SmallVec;
use tracing::info;

use super::connection::Connection;
use super::row::ColumnInfo;
use crate::error::{OrmError, Result};
use crate::schema::{CreateFlags, Record, TableMapping};
use crate::sql::quote_identifier;
use crate::types::OwnedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTableResult {
    Created,
    Migrated,
}

#[derive(Debug)]
struct IndexPlan {
    name: String,
    unique: bool,
    columns: SmallVec<[(i32, String); 4]>,
}

/// Groups the mapping's index declarations into one plan per index name.
fn plan_indexes(mapping: &TableMapping) -> Result<Vec<IndexPlan>> {
    let mut plans: Vec<IndexPlan> = Vec::new();
    for column in mapping.columns() {
        for attr in column.indices() {
            let name = attr
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{}", mapping.table_name(), column.name()));
            match plans.iter_mut().find(|p| p.name == name) {
                Some(plan) => {
                    if plan.unique != attr.unique {
                        return Err(OrmError::Schema(format!(
                            "all the columns in index {} must have the same value for their unique property",
                            name
                        )));
                    }
                    plan.columns.push((attr.order, column.name().to_string()));
                }
                None => {
                    let mut columns = SmallVec::new();
                    columns.push((attr.order, column.name().to_string()));
                    plans.push(IndexPlan {
                        name,
                        unique: attr.unique,
                        columns,
                    });
                }
            }
        }
    }
    for plan in &mut plans {
        plan.columns.sort_by_key(|(order, _)| *order);
    }
    Ok(plans)
}

impl Connection {
    pub fn create_table<T: Record>(&self) -> Result<CreateTableResult> {
        self.create_table_with::<T>(self.create_flags())
    }

    pub fn create_table_with<T: Record>(&self, flags: CreateFlags) -> Result<CreateTableResult> {
        let mapping = self.mapping_with::<T>(flags)?;
        let indexes = plan_indexes(&mapping)?;
        let ticks = self.store_timestamps_as_ticks();
        let existing = self.table_info(mapping.table_name())?;

        let result = if existing.is_empty() {
            let decls = mapping
                .columns()
                .iter()
                .map(|c| c.sql_decl(ticks))
                .collect::<Result<Vec<_>>>()?;
            let mut sql = format!(
                "create table if not exists {}({})",
                quote_identifier(mapping.table_name()),
                decls.join(", ")
            );
            if mapping.without_rowid() {
                sql.push_str(" without rowid");
            }
            self.execute(&sql, &[])?;
            CreateTableResult::Created
        } else {
            self.migrate_table(&mapping, &existing)?;
            CreateTableResult::Migrated
        };

        for plan in indexes {
            let columns: Vec<&str> = plan.columns.iter().map(|(_, name)| name.as_str()).collect();
            self.create_index(&plan.name, mapping.table_name(), &columns, plan.unique)?;
        }

        self.created_tables.lock().insert(TypeId::of::<T>());
        info!(table = mapping.table_name(), result = ?result, "table ready");
        Ok(result)
    }

    fn migrate_table(&self, mapping: &TableMapping, existing: &[ColumnInfo]) -> Result<()> {
        let ticks = self.store_timestamps_as_ticks();
        for column in mapping.columns() {
            let present = existing
                .iter()
                .any(|info| info.name.eq_ignore_ascii_case(column.name()));
            if !present {
                let sql = format!(
                    "alter table {} add column {}",
                    quote_identifier(mapping.table_name()),
                    column.sql_decl(ticks)?
                );
                self.execute(&sql, &[])?;
            }
        }
        Ok(())
    }

    pub fn create_index(&self, index_name: &str, table_name: &str, columns: &[&str], unique: bool) -> Result<usize> {
        let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let sql = format!(
            "create {}index if not exists {} on {}({})",
            if unique { "unique " } else { "" },
            quote_identifier(index_name),
            quote_identifier(table_name),
            columns.join(", ")
        );
        self.execute(&sql, &[])
    }

    pub fn drop_table<T: Record>(&self) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let changed = self.execute(
            &format!("drop table if exists {}", quote_identifier(mapping.table_name())),
            &[],
        )?;
        self.created_tables.lock().remove(&TypeId::of::<T>());
        if self.insert_commands.invalidate(TypeId::of::<T>()) {
            self.handle()?.flush_prepared_statement_cache();
        }
        Ok(changed)
    }

    /// Columns of `table_name` as reported by `pragma table_info`.
    pub fn table_info(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("pragma table_info({})", quote_identifier(table_name));
        self.query_rows(&sql, &[] as &[OwnedValue])?
            .iter()
            .map(ColumnInfo::from_row)
            .collect()
    }
}
