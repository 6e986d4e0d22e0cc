//! # Macros
//!
//! ## enum_field!
//!
//! Implements [`FieldType`](crate::types::FieldType) for a fieldless enum,
//! storing each variant as its discriminant in an `integer` column.
//!
//! ### Usage
//!
//! ```ignore
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! enum Priority {
//!     #[default]
//!     Low,
//!     Normal,
//!     High = 10,
//! }
//!
//! turorm::enum_field!(Priority { Low, Normal, High });
//!
//! // Low ⇄ 0, Normal ⇄ 1, High ⇄ 10; NULL reads as Low.
//! ```
//!
//! NULL reads as the first listed variant; an integer matching no variant is
//! `OrmError::UnsupportedType`.

/// Maps a fieldless enum to an integer column by discriminant.
#[macro_export]
macro_rules! enum_field {
    ($ty:ident { $first:ident $(, $variant:ident)* $(,)? }) => {
        impl $crate::types::FieldType for $ty {
            fn data_type() -> $crate::types::DataType {
                $crate::types::DataType::Enum
            }

            fn to_value(&self) -> $crate::types::OwnedValue {
                let ordinal = match self {
                    $ty::$first => $ty::$first as i64,
                    $($ty::$variant => $ty::$variant as i64,)*
                };
                $crate::types::OwnedValue::Int(ordinal)
            }

            fn from_value(value: $crate::types::OwnedValue) -> $crate::Result<Self> {
                match value {
                    $crate::types::OwnedValue::Null => Ok($ty::$first),
                    $crate::types::OwnedValue::Int(i) if i == $ty::$first as i64 => Ok($ty::$first),
                    $($crate::types::OwnedValue::Int(i) if i == $ty::$variant as i64 => Ok($ty::$variant),)*
                    other => Err($crate::OrmError::UnsupportedType(format!(
                        "{} is not a {} variant",
                        other.display_string(),
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::types::{DataType, FieldType, OwnedValue};
    use crate::OrmError;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Level {
        Trace,
        Info,
        Error = 40,
    }

    enum_field!(Level { Trace, Info, Error });

    #[test]
    fn maps_by_discriminant() {
        assert_eq!(Level::data_type(), DataType::Enum);
        assert_eq!(Level::Info.to_value(), OwnedValue::Int(1));
        assert_eq!(Level::Error.to_value(), OwnedValue::Int(40));
        assert_eq!(Level::from_value(OwnedValue::Int(40)).unwrap(), Level::Error);
    }

    #[test]
    fn null_reads_first_variant() {
        assert_eq!(Level::from_value(OwnedValue::Null).unwrap(), Level::Trace);
    }

    #[test]
    fn unknown_ordinal_fails() {
        assert!(matches!(
            Level::from_value(OwnedValue::Int(7)),
            Err(OrmError::UnsupportedType(_))
        ));
    }
}
