//! # Record Declarations
//!
//! A record type declares its table through [`Record::describe`], returning a
//! [`TableDef`] built from one [`ColumnDef`] per persisted field. Each field
//! is registered together with a getter and a mutable getter, which is all the
//! mapping layer needs to read and materialize instances.
//!
//! ## Declaration Example
//!
//! ```rust,ignore
//! use turorm::schema::{ColumnDef, Record, TableDef};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i32,
//!     nickname: Option<String>,
//! }
//!
//! impl Record for Person {
//!     fn describe() -> TableDef<Self> {
//!         TableDef::<Self>::new("Person")
//!             .field(ColumnDef::new("Id").primary_key().auto_increment(), |p| &p.id, |p| &mut p.id)
//!             .field(ColumnDef::new("Name").max_length(64).indexed(), |p| &p.name, |p| &mut p.name)
//!             .field(ColumnDef::new("Age"), |p| &p.age, |p| &mut p.age)
//!             .field(ColumnDef::new("Nickname"), |p| &p.nickname, |p| &mut p.nickname)
//!     }
//! }
//! ```
//!
//! ## Constraints
//!
//! | Constraint | Builder | Effect |
//! |------------|---------|--------|
//! | PrimaryKey | `primary_key()` | column is the table's primary key |
//! | AutoIncrement | `auto_increment()` | integer PK: AUTOINCREMENT; uuid PK: generated v4 |
//! | NotNull | `not_null()` | declared NOT NULL |
//! | Indexed | `indexed()`, `unique()`, `index(name, order, unique)` | index membership |
//! | Collate | `collate(name)` | declared collation |
//! | MaxLength | `max_length(n)` | `varchar(n)` |
//! | Ignore | `ignore()` | not persisted |
//!
//! The property name passed to `ColumnDef::new` is what expressions refer to
//! (`col("Name")`); `with_name` renames the storage column.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{OrmError, Result};
use crate::types::{DataType, FieldType, OwnedValue};

/// A plain data type persisted as one table row.
///
/// Materialization starts from `Default::default()` and assigns each selected
/// column through its setter.
pub trait Record: Default + 'static {
    fn describe() -> TableDef<Self>;
}

/// Index membership of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexedAttr {
    pub name: Option<String>,
    pub order: i32,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Indexed(IndexedAttr),
    Collate(String),
    MaxLength(u32),
    Ignore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    property: String,
    name: Option<String>,
    constraints: SmallVec<[Constraint; 4]>,
}

impl ColumnDef {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            name: None,
            constraints: SmallVec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Stores the column under `name` instead of the property name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn primary_key(self) -> Self {
        self.with_constraint(Constraint::PrimaryKey)
    }

    pub fn auto_increment(self) -> Self {
        self.with_constraint(Constraint::AutoIncrement)
    }

    pub fn not_null(self) -> Self {
        self.with_constraint(Constraint::NotNull)
    }

    pub fn indexed(self) -> Self {
        self.with_constraint(Constraint::Indexed(IndexedAttr::default()))
    }

    pub fn unique(self) -> Self {
        self.with_constraint(Constraint::Indexed(IndexedAttr {
            unique: true,
            ..IndexedAttr::default()
        }))
    }

    pub fn index(self, name: impl Into<String>, order: i32, unique: bool) -> Self {
        self.with_constraint(Constraint::Indexed(IndexedAttr {
            name: Some(name.into()),
            order,
            unique,
        }))
    }

    pub fn collate(self, collation: impl Into<String>) -> Self {
        self.with_constraint(Constraint::Collate(collation.into()))
    }

    pub fn max_length(self, max_length: u32) -> Self {
        self.with_constraint(Constraint::MaxLength(max_length))
    }

    pub fn ignore(self) -> Self {
        self.with_constraint(Constraint::Ignore)
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Storage name: the explicit name if one was given, else the property.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.property)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn has_constraint(&self, constraint: &Constraint) -> bool {
        self.constraints
            .iter()
            .any(|c| std::mem::discriminant(c) == std::mem::discriminant(constraint))
    }

    pub fn collation(&self) -> Option<&str> {
        self.constraints.iter().rev().find_map(|c| match c {
            Constraint::Collate(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn max_len(&self) -> Option<u32> {
        self.constraints.iter().rev().find_map(|c| match c {
            Constraint::MaxLength(len) => Some(*len),
            _ => None,
        })
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexedAttr> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Indexed(attr) => Some(attr),
            _ => None,
        })
    }
}

/// Type-erased read/write access to one field of a record.
pub(crate) trait ColumnAccessor: Send + Sync {
    fn get(&self, record: &dyn Any) -> Result<OwnedValue>;
    fn set(&self, record: &mut dyn Any, value: OwnedValue) -> Result<()>;
}

struct FieldAccessor<T, F, G, S> {
    get: G,
    get_mut: S,
    _marker: PhantomData<fn(&T) -> &F>,
}

impl<T, F, G, S> ColumnAccessor for FieldAccessor<T, F, G, S>
where
    T: 'static,
    F: FieldType,
    G: Fn(&T) -> &F + Send + Sync,
    S: Fn(&mut T) -> &mut F + Send + Sync,
{
    fn get(&self, record: &dyn Any) -> Result<OwnedValue> {
        let record = record.downcast_ref::<T>().ok_or_else(wrong_record)?;
        Ok((self.get)(record).to_value())
    }

    fn set(&self, record: &mut dyn Any, value: OwnedValue) -> Result<()> {
        let record = record.downcast_mut::<T>().ok_or_else(wrong_record)?;
        *(self.get_mut)(record) = F::from_value(value)?;
        Ok(())
    }
}

fn wrong_record() -> OrmError {
    OrmError::UnsupportedType("column accessor applied to a record of another type".into())
}

pub(crate) struct FieldDef {
    pub(crate) def: ColumnDef,
    pub(crate) data_type: DataType,
    pub(crate) accessor: Arc<dyn ColumnAccessor>,
}

/// Table declaration for record type `T`.
pub struct TableDef<T> {
    name: String,
    without_rowid: bool,
    fields: Vec<FieldDef>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> TableDef<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            without_rowid: false,
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares the table `WITHOUT ROWID`.
    pub fn without_rowid(mut self) -> Self {
        self.without_rowid = true;
        self
    }

    pub fn field<F, G, S>(mut self, def: ColumnDef, get: G, get_mut: S) -> Self
    where
        F: FieldType + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.fields.push(FieldDef {
            def,
            data_type: F::data_type(),
            accessor: Arc::new(FieldAccessor {
                get,
                get_mut,
                _marker: PhantomData,
            }),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_without_rowid(&self) -> bool {
        self.without_rowid
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.fields.iter().map(|f| &f.def)
    }

    pub(crate) fn into_fields(self) -> (String, bool, Vec<FieldDef>) {
        (self.name, self.without_rowid, self.fields)
    }
}

impl<T> fmt::Debug for TableDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDef")
            .field("name", &self.name)
            .field("without_rowid", &self.without_rowid)
            .field(
                "columns",
                &self.fields.iter().map(|fd| fd.def.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
