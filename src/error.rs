//! # Error Taxonomy
//!
//! Every fallible operation in turorm returns [`Result<T>`], an alias over
//! [`OrmError`]. Variants are grouped by the layer that raises them:
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `Connection` | opening the engine, applying a key or busy timeout |
//! | `Schema` | mapping build, index grouping, DDL preconditions |
//! | `UnsupportedExpression` | expression compiler, join generation |
//! | `UnsupportedType` | codec bind/read, value coercion |
//! | `Execution` | any engine failure during prepare/bind/step |
//! | `NotNullConstraintViolation` | insert/update hitting a NOT NULL column |
//! | `TransactionState` | begin while open, malformed savepoint tokens |
//! | `NotFound` | `get`, `first`, `element_at` on empty results |
//!
//! Engine codes are preserved in `Execution::code` (extended result code) so
//! callers can match on `rusqlite::ffi::SQLITE_*` constants after masking
//! with `0xff`.

use std::sync::Arc;

use thiserror::Error;

use crate::schema::{Column, TableMapping};
use crate::types::OwnedValue;

pub type Result<T> = std::result::Result<T, OrmError>;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("could not open database '{path}': {message}")]
    Connection { path: String, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("{message} (code {code})")]
    Execution { code: i32, message: String },

    #[error("NOT NULL constraint violation: {message}")]
    NotNullConstraintViolation {
        message: String,
        mapping: Option<Arc<TableMapping>>,
        record: Option<Vec<OwnedValue>>,
    },

    #[error("invalid transaction state: {0}")]
    TransactionState(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl OrmError {
    /// Extended engine result code, when the error came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            OrmError::Execution { code, .. } => Some(*code),
            OrmError::NotNullConstraintViolation { .. } => Some(crate::database::SQLITE_CONSTRAINT_NOTNULL),
            _ => None,
        }
    }

    /// Primary engine result code (extended code masked to its low byte).
    pub fn primary_code(&self) -> Option<i32> {
        self.code().map(|code| code & 0xff)
    }

    /// True for engine conditions after which the open transaction cannot be
    /// trusted: I/O errors, a full disk, a busy lock, out of memory, interrupt.
    pub fn is_transient(&self) -> bool {
        use rusqlite::ffi;

        matches!(
            self.primary_code(),
            Some(ffi::SQLITE_IOERR)
                | Some(ffi::SQLITE_FULL)
                | Some(ffi::SQLITE_BUSY)
                | Some(ffi::SQLITE_NOMEM)
                | Some(ffi::SQLITE_INTERRUPT)
        )
    }

    /// Mapped non-nullable columns whose value in the offending record was NULL.
    ///
    /// Empty for every other variant and when the violation was raised by raw
    /// SQL without a mapped record attached.
    pub fn not_null_columns(&self) -> Vec<&Column> {
        match self {
            OrmError::NotNullConstraintViolation {
                mapping: Some(mapping),
                record: Some(values),
                ..
            } => mapping
                .columns()
                .iter()
                .zip(values)
                .filter(|(column, value)| !column.is_nullable() && value.is_null())
                .map(|(column, _)| column)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Attaches the mapping and record values to a NOT NULL violation.
    pub(crate) fn attach_record<T: crate::schema::Record>(
        self,
        mapping: &Arc<TableMapping>,
        record: &T,
    ) -> Self {
        match self {
            OrmError::NotNullConstraintViolation { message, .. } => {
                let values = mapping
                    .columns()
                    .iter()
                    .map(|column| column.value_of(record).unwrap_or(OwnedValue::Null))
                    .collect();
                OrmError::NotNullConstraintViolation {
                    message,
                    mapping: Some(Arc::clone(mapping)),
                    record: Some(values),
                }
            }
            other => other,
        }
    }
}

impl From<rusqlite::Error> for OrmError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.unwrap_or_else(|| failure.to_string());
                if failure.extended_code == crate::database::SQLITE_CONSTRAINT_NOTNULL {
                    OrmError::NotNullConstraintViolation {
                        message,
                        mapping: None,
                        record: None,
                    }
                } else {
                    OrmError::Execution {
                        code: failure.extended_code,
                        message,
                    }
                }
            }
            other => OrmError::Execution {
                code: rusqlite::ffi::SQLITE_ERROR,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    #[test]
    fn busy_and_io_errors_are_transient() {
        let busy = OrmError::Execution {
            code: ffi::SQLITE_BUSY,
            message: "database is locked".into(),
        };
        let io = OrmError::Execution {
            code: ffi::SQLITE_IOERR | (3 << 8),
            message: "disk I/O error".into(),
        };
        let syntax = OrmError::Execution {
            code: ffi::SQLITE_ERROR,
            message: "near \"selec\": syntax error".into(),
        };

        assert!(busy.is_transient());
        assert!(io.is_transient(), "extended IOERR codes mask to IOERR");
        assert!(!syntax.is_transient());
        assert!(!OrmError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn not_null_violation_reports_its_code() {
        let err = OrmError::NotNullConstraintViolation {
            message: "NOT NULL constraint failed: T.a".into(),
            mapping: None,
            record: None,
        };

        assert_eq!(err.primary_code(), Some(ffi::SQLITE_CONSTRAINT));
        assert!(err.not_null_columns().is_empty());
    }
}
