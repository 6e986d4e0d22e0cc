//! # Semantic Field Types
//!
//! `DataType` classifies a record field by what it means rather than how the
//! engine stores it. The codec uses it to pick a column declaration, a bind
//! routine and a read routine; the expression compiler uses it to decide
//! whether a receiver is text.
//!
//! ## Declarations
//!
//! | Category | Types | Declared as |
//! |----------|-------|-------------|
//! | **Boolean** | Bool | `integer` |
//! | **Narrow integer** | Int8, Int16, Int32, UInt8, UInt16, Enum | `integer` |
//! | **Wide integer** | UInt32, Int64 | `bigint` |
//! | **Real** | Float32, Float64, Decimal | `float` |
//! | **Text** | Text | `varchar` / `varchar(n)` |
//! | **Binary** | Blob | `blob` |
//! | **Time** | Duration, DateTimeOffset | `bigint` |
//! | **Time** | DateTime | `bigint` (ticks) or `datetime` (text) |
//! | **Identifier** | Uuid | `varchar(36)` |
//!
//! `Unsupported` carries the Rust type name of a field the codec has no
//! representation for; mapping build rejects it with a schema error.

/// Semantic type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    Blob,
    Duration,
    DateTime,
    DateTimeOffset,
    Enum,
    Uuid,
    Unsupported(&'static str),
}

impl DataType {
    /// Column type text for a `create table` / `alter table` declaration.
    ///
    /// Returns `None` for `Unsupported`. `max_length` only affects `Text`.
    pub fn sql_type(&self, store_timestamps_as_ticks: bool, max_length: Option<u32>) -> Option<String> {
        let decl = match self {
            DataType::Bool
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::UInt8
            | DataType::UInt16
            | DataType::Enum => "integer".to_string(),
            DataType::UInt32 | DataType::Int64 => "bigint".to_string(),
            DataType::Float32 | DataType::Float64 | DataType::Decimal => "float".to_string(),
            DataType::Text => match max_length {
                Some(len) => format!("varchar({})", len),
                None => "varchar".to_string(),
            },
            DataType::Blob => "blob".to_string(),
            DataType::Duration | DataType::DateTimeOffset => "bigint".to_string(),
            DataType::DateTime => {
                if store_timestamps_as_ticks {
                    "bigint".to_string()
                } else {
                    "datetime".to_string()
                }
            }
            DataType::Uuid => "varchar(36)".to_string(),
            DataType::Unsupported(_) => return None,
        };
        Some(decl)
    }

    /// True for types that may back an AUTOINCREMENT primary key.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::Int64
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Text)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DataType::Unsupported(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "i8",
            DataType::Int16 => "i16",
            DataType::Int32 => "i32",
            DataType::UInt8 => "u8",
            DataType::UInt16 => "u16",
            DataType::UInt32 => "u32",
            DataType::Int64 => "i64",
            DataType::Float32 => "f32",
            DataType::Float64 => "f64",
            DataType::Decimal => "decimal",
            DataType::Text => "text",
            DataType::Blob => "blob",
            DataType::Duration => "duration",
            DataType::DateTime => "datetime",
            DataType::DateTimeOffset => "datetime with offset",
            DataType::Enum => "enum",
            DataType::Uuid => "uuid",
            DataType::Unsupported(name) => name,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_follow_storage_policy() {
        assert_eq!(DataType::Bool.sql_type(true, None).as_deref(), Some("integer"));
        assert_eq!(DataType::UInt32.sql_type(true, None).as_deref(), Some("bigint"));
        assert_eq!(DataType::Decimal.sql_type(true, None).as_deref(), Some("float"));
        assert_eq!(DataType::Text.sql_type(true, Some(64)).as_deref(), Some("varchar(64)"));
        assert_eq!(DataType::Text.sql_type(true, None).as_deref(), Some("varchar"));
        assert_eq!(DataType::DateTime.sql_type(true, None).as_deref(), Some("bigint"));
        assert_eq!(DataType::DateTime.sql_type(false, None).as_deref(), Some("datetime"));
        assert_eq!(DataType::Uuid.sql_type(false, None).as_deref(), Some("varchar(36)"));
        assert_eq!(DataType::Unsupported("HashMap").sql_type(true, None), None);
    }

    #[test]
    fn max_length_is_ignored_for_non_text() {
        assert_eq!(DataType::Int32.sql_type(true, Some(10)).as_deref(), Some("integer"));
    }
}
