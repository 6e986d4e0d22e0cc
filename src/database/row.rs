use std::sync::Arc;

use crate::error::{OrmError, Result};
use crate::types::OwnedValue;

/// Untyped result row, values in select-list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    pub values: Vec<OwnedValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<OwnedValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&OwnedValue> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&OwnedValue> {
        let index = self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))?;
        self.values.get(index)
    }

    pub fn get_int(&self, index: usize) -> Result<i64> {
        match self.get(index) {
            Some(OwnedValue::Int(i)) => Ok(*i),
            Some(other) => Err(expected("INTEGER", other)),
            None => Err(out_of_bounds(index)),
        }
    }

    pub fn get_float(&self, index: usize) -> Result<f64> {
        match self.get(index) {
            Some(OwnedValue::Float(f)) => Ok(*f),
            Some(OwnedValue::Int(i)) => Ok(*i as f64),
            Some(other) => Err(expected("REAL", other)),
            None => Err(out_of_bounds(index)),
        }
    }

    pub fn get_text(&self, index: usize) -> Result<&str> {
        match self.get(index) {
            Some(OwnedValue::Text(s)) => Ok(s),
            Some(other) => Err(expected("TEXT", other)),
            None => Err(out_of_bounds(index)),
        }
    }

    pub fn get_blob(&self, index: usize) -> Result<&[u8]> {
        match self.get(index) {
            Some(OwnedValue::Blob(b)) => Ok(b),
            Some(other) => Err(expected("BLOB", other)),
            None => Err(out_of_bounds(index)),
        }
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.get(index), Some(OwnedValue::Null))
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }
}

fn expected(kind: &str, got: &OwnedValue) -> OrmError {
    OrmError::UnsupportedType(format!("expected {}, got {:?}", kind, got))
}

fn out_of_bounds(index: usize) -> OrmError {
    OrmError::NotFound(format!("column {} out of bounds", index))
}

/// One row of `pragma table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        let default_value = match row.get_by_name("dflt_value") {
            Some(OwnedValue::Null) | None => None,
            Some(other) => Some(other.display_string()),
        };
        Ok(Self {
            name: text(row, "name")?,
            declared_type: text(row, "type")?,
            not_null: int(row, "notnull")? != 0,
            default_value,
            primary_key: int(row, "pk")? != 0,
        })
    }
}

fn text(row: &Row, name: &str) -> Result<String> {
    match row.get_by_name(name) {
        Some(OwnedValue::Text(s)) => Ok(s.clone()),
        Some(OwnedValue::Null) => Ok(String::new()),
        Some(other) => Err(expected("TEXT", other)),
        None => Err(OrmError::NotFound(format!("table_info has no {} column", name))),
    }
}

fn int(row: &Row, name: &str) -> Result<i64> {
    match row.get_by_name(name) {
        Some(OwnedValue::Int(i)) => Ok(*i),
        Some(other) => Err(expected("INTEGER", other)),
        None => Err(OrmError::NotFound(format!("table_info has no {} column", name))),
    }
}
