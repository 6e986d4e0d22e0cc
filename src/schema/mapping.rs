//! # Table Mappings
//!
//! A `TableMapping` is the resolved form of a record declaration: every
//! persisted column with its storage name, semantic type, nullability, key and
//! index facts, plus the SQL fragments derived from them.
//!
//! ## Conventions
//!
//! `CreateFlags` enable naming conventions that apply only where the
//! declaration is silent:
//!
//! | Flag | Convention |
//! |------|------------|
//! | `IMPLICIT_PK` | a property named `Id` (any case) becomes the primary key |
//! | `IMPLICIT_INDEX` | a non-key column whose name ends in `Id` gets an index |
//! | `AUTO_INC_PK` | an integer primary key becomes AUTOINCREMENT |
//!
//! ## Column Rules
//!
//! ```text
//! nullable      = !(primary_key || not_null)
//! auto_guid     = auto && type == Uuid
//! auto_inc      = auto && !auto_guid       (requires primary_key, integer type)
//! ```
//!
//! At most one primary key per table. Violations are schema errors raised
//! when the mapping is built, before any SQL runs.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;

use super::table::{ColumnAccessor, Constraint, FieldDef, IndexedAttr, Record};
use crate::error::{OrmError, Result};
use crate::sql::quote_identifier;
use crate::types::{DataType, OwnedValue};

pub const IMPLICIT_PK_NAME: &str = "Id";
pub const IMPLICIT_INDEX_SUFFIX: &str = "Id";

/// Naming conventions applied while building a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CreateFlags(u8);

impl CreateFlags {
    pub const NONE: CreateFlags = CreateFlags(0);
    pub const IMPLICIT_PK: CreateFlags = CreateFlags(1);
    pub const IMPLICIT_INDEX: CreateFlags = CreateFlags(2);
    pub const AUTO_INC_PK: CreateFlags = CreateFlags(4);
    pub const ALL_IMPLICIT: CreateFlags = CreateFlags(1 | 2 | 4);

    pub fn contains(self, other: CreateFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CreateFlags {
    type Output = CreateFlags;

    fn bitor(self, rhs: CreateFlags) -> CreateFlags {
        CreateFlags(self.0 | rhs.0)
    }
}

pub struct Column {
    property_name: String,
    name: String,
    data_type: DataType,
    nullable: bool,
    collation: Option<String>,
    max_length: Option<u32>,
    is_pk: bool,
    is_auto_inc: bool,
    is_auto_guid: bool,
    indices: SmallVec<[IndexedAttr; 2]>,
    accessor: Arc<dyn ColumnAccessor>,
}

impl Column {
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn collation(&self) -> Option<&str> {
        self.collation.as_deref()
    }

    pub fn max_length(&self) -> Option<u32> {
        self.max_length
    }

    pub fn is_pk(&self) -> bool {
        self.is_pk
    }

    pub fn is_auto_inc(&self) -> bool {
        self.is_auto_inc
    }

    pub fn is_auto_guid(&self) -> bool {
        self.is_auto_guid
    }

    pub fn indices(&self) -> &[IndexedAttr] {
        &self.indices
    }

    /// Reads this column's field from `record`.
    pub fn value_of<T: Record>(&self, record: &T) -> Result<OwnedValue> {
        self.accessor.get(record as &dyn Any)
    }

    /// Writes `value` into this column's field of `record`.
    pub fn assign<T: Record>(&self, record: &mut T, value: OwnedValue) -> Result<()> {
        self.accessor.set(record as &mut dyn Any, value)
    }

    /// Column declaration for `create table` / `alter table add column`.
    pub fn sql_decl(&self, store_timestamps_as_ticks: bool) -> Result<String> {
        let ty = if self.is_auto_inc {
            "integer".to_string()
        } else {
            self.data_type
                .sql_type(store_timestamps_as_ticks, self.max_length)
                .ok_or_else(|| unsupported_field(&self.property_name, self.data_type))?
        };

        let mut decl = format!("{} {}", quote_identifier(&self.name), ty);
        if self.is_pk {
            decl.push_str(" primary key");
        }
        if self.is_auto_inc {
            decl.push_str(" autoincrement");
        }
        if !self.nullable {
            decl.push_str(" not null");
        }
        if let Some(collation) = &self.collation {
            decl.push_str(" collate ");
            decl.push_str(collation);
        }
        Ok(decl)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("property_name", &self.property_name)
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("is_pk", &self.is_pk)
            .field("is_auto_inc", &self.is_auto_inc)
            .field("is_auto_guid", &self.is_auto_guid)
            .finish_non_exhaustive()
    }
}

fn unsupported_field(property: &str, data_type: DataType) -> OrmError {
    OrmError::Schema(format!(
        "don't know about type {} of property {}",
        data_type, property
    ))
}

pub struct TableMapping {
    record_type: TypeId,
    type_name: &'static str,
    table_name: String,
    without_rowid: bool,
    columns: Vec<Column>,
    pk: Option<usize>,
    has_auto_inc_pk: bool,
    get_by_primary_key_sql: String,
    insert_columns: OnceLock<Vec<usize>>,
    insert_or_replace_columns: OnceLock<Vec<usize>>,
}

impl TableMapping {
    /// Builds the mapping for `T` from its declaration.
    pub fn build<T: Record>(flags: CreateFlags) -> Result<Self> {
        let (table_name, without_rowid, fields) = T::describe().into_fields();
        let fields: Vec<FieldDef> = fields
            .into_iter()
            .filter(|f| !f.def.has_constraint(&Constraint::Ignore))
            .collect();

        let explicit_pk = fields.iter().any(|f| f.def.has_constraint(&Constraint::PrimaryKey));
        let mut columns = Vec::with_capacity(fields.len());

        for field in fields {
            let def = &field.def;
            let property = def.property().to_string();

            if !field.data_type.is_supported() {
                return Err(unsupported_field(&property, field.data_type));
            }

            let is_pk = def.has_constraint(&Constraint::PrimaryKey)
                || (!explicit_pk
                    && flags.contains(CreateFlags::IMPLICIT_PK)
                    && property.eq_ignore_ascii_case(IMPLICIT_PK_NAME));

            let is_auto = def.has_constraint(&Constraint::AutoIncrement)
                || (is_pk
                    && flags.contains(CreateFlags::AUTO_INC_PK)
                    && field.data_type.is_integer());
            let is_auto_guid = is_auto && field.data_type == DataType::Uuid;
            let is_auto_inc = is_auto && !is_auto_guid;

            if is_auto_inc && !is_pk {
                return Err(OrmError::Schema(format!(
                    "{}.{}: auto-increment requires the column to be the primary key",
                    table_name, property
                )));
            }
            if is_auto_inc && !field.data_type.is_integer() {
                return Err(OrmError::Schema(format!(
                    "{}.{}: auto-increment requires an integer column, found {}",
                    table_name, property, field.data_type
                )));
            }

            let mut indices: SmallVec<[IndexedAttr; 2]> = def.indices().cloned().collect();
            let name = def.name().to_string();
            if indices.is_empty()
                && !is_pk
                && flags.contains(CreateFlags::IMPLICIT_INDEX)
                && ends_with_ignore_case(&name, IMPLICIT_INDEX_SUFFIX)
            {
                indices.push(IndexedAttr::default());
            }

            columns.push(Column {
                property_name: property,
                nullable: !(is_pk || def.has_constraint(&Constraint::NotNull)),
                collation: def.collation().map(str::to_string),
                max_length: def.max_len(),
                data_type: field.data_type,
                is_pk,
                is_auto_inc,
                is_auto_guid,
                indices,
                name,
                accessor: field.accessor,
            });
        }

        let pks: SmallVec<[usize; 2]> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_pk)
            .map(|(i, _)| i)
            .collect();
        if pks.len() > 1 {
            return Err(OrmError::Schema(format!(
                "{} declares more than one primary key",
                table_name
            )));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name.eq_ignore_ascii_case(&column.name)) {
                return Err(OrmError::Schema(format!(
                    "{} declares column {} more than once",
                    table_name, column.name
                )));
            }
        }

        let pk = pks.first().copied();
        let has_auto_inc_pk = pk.map(|i| columns[i].is_auto_inc).unwrap_or(false);
        let get_by_primary_key_sql = match pk {
            Some(i) => format!(
                "select * from {} where {} = ?",
                quote_identifier(&table_name),
                quote_identifier(&columns[i].name)
            ),
            None => format!("select * from {} limit 1", quote_identifier(&table_name)),
        };

        Ok(Self {
            record_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            table_name,
            without_rowid,
            columns,
            pk,
            has_auto_inc_pk,
            get_by_primary_key_sql,
            insert_columns: OnceLock::new(),
            insert_or_replace_columns: OnceLock::new(),
        })
    }

    pub fn record_type(&self) -> TypeId {
        self.record_type
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn without_rowid(&self) -> bool {
        self.without_rowid
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn pk(&self) -> Option<&Column> {
        self.pk.map(|i| &self.columns[i])
    }

    pub fn has_auto_inc_pk(&self) -> bool {
        self.has_auto_inc_pk
    }

    pub fn get_by_primary_key_sql(&self) -> &str {
        &self.get_by_primary_key_sql
    }

    /// Columns bound by a plain insert: everything except the auto-increment key.
    pub fn insert_columns(&self) -> Vec<&Column> {
        self.insert_columns
            .get_or_init(|| {
                self.columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !c.is_auto_inc)
                    .map(|(i, _)| i)
                    .collect()
            })
            .iter()
            .map(|&i| &self.columns[i])
            .collect()
    }

    /// Columns bound by `insert or replace`: all of them.
    pub fn insert_or_replace_columns(&self) -> Vec<&Column> {
        self.insert_or_replace_columns
            .get_or_init(|| (0..self.columns.len()).collect())
            .iter()
            .map(|&i| &self.columns[i])
            .collect()
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Result-column lookup: exact name first, then case-insensitive. A migrated
    /// column keeps the spelling it was created with.
    pub(crate) fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn find_column_by_property_name(&self, property: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.property_name == property)
    }
}

impl fmt::Debug for TableMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapping")
            .field("type_name", &self.type_name)
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .field("has_auto_inc_pk", &self.has_auto_inc_pk)
            .finish_non_exhaustive()
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
