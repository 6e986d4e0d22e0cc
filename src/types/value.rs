//! # Host Values
//!
//! `HostValue` is what an expression constant can hold: a single scalar, a
//! list of scalars (compiled to an IN-list), or an object whose named members
//! can be read by a `Member` expression node.
//!
//! ## Members
//!
//! Objects are opaque to the compiler. They expose members through the
//! [`Members`] trait, implemented here for string-keyed maps and, via
//! [`HostValue::record`], for any mapped record:
//!
//! ```ignore
//! let filter = HostValue::record(&template)?;
//! let q = conn.table::<Person>()?
//!     .filter(col("Name").eq(Expr::constant(filter).member("Name")));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

use super::OwnedValue;
use crate::error::Result;
use crate::schema::{CreateFlags, Record, TableMapping};

/// Read access to the named members of a host object.
pub trait Members: Send + Sync {
    fn member(&self, name: &str) -> Option<HostValue>;

    fn type_name(&self) -> &str {
        "object"
    }
}

#[derive(Clone)]
pub enum HostValue {
    Scalar(OwnedValue),
    List(Vec<OwnedValue>),
    Object(Arc<dyn Members>),
}

impl HostValue {
    pub fn null() -> Self {
        HostValue::Scalar(OwnedValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Scalar(OwnedValue::Null))
    }

    pub fn as_scalar(&self) -> Option<&OwnedValue> {
        match self {
            HostValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            HostValue::Scalar(v) => v.type_name(),
            HostValue::List(_) => "list",
            HostValue::Object(obj) => obj.type_name(),
        }
    }

    /// Wraps a record so its mapped properties can be read by member access.
    pub fn record<T: Record + Send + Sync>(record: T) -> Result<Self> {
        let mapping = TableMapping::build::<T>(CreateFlags::NONE)?;
        Ok(HostValue::Object(Arc::new(RecordMembers { record, mapping })))
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            HostValue::List(items) => f.debug_tuple("List").field(items).finish(),
            HostValue::Object(obj) => write!(f, "Object({})", obj.type_name()),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Scalar(a), HostValue::Scalar(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<OwnedValue> for HostValue {
    fn from(v: OwnedValue) -> Self {
        HostValue::Scalar(v)
    }
}

impl From<Vec<OwnedValue>> for HostValue {
    fn from(items: Vec<OwnedValue>) -> Self {
        HostValue::List(items)
    }
}

impl Members for HashMap<String, HostValue> {
    fn member(&self, name: &str) -> Option<HostValue> {
        self.get(name).cloned()
    }

    fn type_name(&self) -> &str {
        "map"
    }
}

impl Members for std::collections::HashMap<String, HostValue> {
    fn member(&self, name: &str) -> Option<HostValue> {
        self.get(name).cloned()
    }

    fn type_name(&self) -> &str {
        "map"
    }
}

impl Members for BTreeMap<String, HostValue> {
    fn member(&self, name: &str) -> Option<HostValue> {
        self.get(name).cloned()
    }

    fn type_name(&self) -> &str {
        "map"
    }
}

struct RecordMembers<T> {
    record: T,
    mapping: TableMapping,
}

impl<T: Record + Send + Sync> Members for RecordMembers<T> {
    fn member(&self, name: &str) -> Option<HostValue> {
        let column = self.mapping.find_column_by_property_name(name)?;
        column.value_of(&self.record).ok().map(HostValue::Scalar)
    }

    fn type_name(&self) -> &str {
        self.mapping.type_name()
    }
}
