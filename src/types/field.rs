//! # Field Types
//!
//! `FieldType` connects a Rust field type to its semantic [`DataType`] and to
//! the [`OwnedValue`] currency. Mapping build asks `data_type()` for the column
//! declaration; insert/update read fields through `to_value`; materialization
//! writes them back through `from_value`.
//!
//! NULL read into a non-`Option` field yields the type's default value, the
//! same thing a freshly constructed record would hold.
//!
//! Fieldless enums are mapped by ordinal with [`enum_field!`](crate::enum_field).

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use uuid::Uuid;

use super::owned_value::parse_uuid;
use super::{DataType, Decimal, OwnedValue};
use crate::error::{OrmError, Result};

pub trait FieldType: Sized {
    fn data_type() -> DataType;

    /// True when the field can hold NULL on its own (`Option<_>`).
    fn is_optional() -> bool {
        false
    }

    fn to_value(&self) -> OwnedValue;

    fn from_value(value: OwnedValue) -> Result<Self>;
}

pub(crate) fn mismatch(target: &str, value: &OwnedValue) -> OrmError {
    OrmError::UnsupportedType(format!(
        "cannot convert {} value into {}",
        value.type_name(),
        target
    ))
}

macro_rules! integer_field {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn data_type() -> DataType {
                    DataType::$dt
                }

                fn to_value(&self) -> OwnedValue {
                    OwnedValue::Int(i64::from(*self))
                }

                fn from_value(value: OwnedValue) -> Result<Self> {
                    match value {
                        OwnedValue::Null => Ok(<$ty>::default()),
                        OwnedValue::Int(i) => <$ty>::try_from(i).map_err(|_| {
                            OrmError::UnsupportedType(format!(
                                "{} is out of range for {}",
                                i,
                                stringify!($ty)
                            ))
                        }),
                        OwnedValue::Bool(b) => Ok(<$ty>::from(b)),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

integer_field! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    i64 => Int64,
}

impl FieldType for bool {
    fn data_type() -> DataType {
        DataType::Bool
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Bool(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(false),
            OwnedValue::Bool(b) => Ok(b),
            OwnedValue::Int(i) => Ok(i == 1),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FieldType for f64 {
    fn data_type() -> DataType {
        DataType::Float64
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Float(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(0.0),
            OwnedValue::Float(f) => Ok(f),
            OwnedValue::Int(i) => Ok(i as f64),
            OwnedValue::Decimal(d) => Ok(d.to_f64()),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FieldType for f32 {
    fn data_type() -> DataType {
        DataType::Float32
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Float(f64::from(*self))
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FieldType for Decimal {
    fn data_type() -> DataType {
        DataType::Decimal
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Decimal(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(Decimal::default()),
            OwnedValue::Decimal(d) => Ok(d),
            OwnedValue::Float(f) => Decimal::try_from(f),
            OwnedValue::Int(i) => Ok(Decimal::new(i128::from(i), 0)),
            other => Err(mismatch("decimal", &other)),
        }
    }
}

impl FieldType for String {
    fn data_type() -> DataType {
        DataType::Text
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Text(self.clone())
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(String::new()),
            OwnedValue::Text(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FieldType for Vec<u8> {
    fn data_type() -> DataType {
        DataType::Blob
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Blob(self.clone())
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(Vec::new()),
            OwnedValue::Blob(b) => Ok(b),
            OwnedValue::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

impl FieldType for TimeDelta {
    fn data_type() -> DataType {
        DataType::Duration
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Interval(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(TimeDelta::zero()),
            OwnedValue::Interval(d) => Ok(d),
            other => Err(mismatch("TimeDelta", &other)),
        }
    }
}

impl FieldType for NaiveDateTime {
    fn data_type() -> DataType {
        DataType::DateTime
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Timestamp(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(NaiveDateTime::default()),
            OwnedValue::Timestamp(ts) => Ok(ts),
            OwnedValue::TimestampTz(ts) => Ok(ts.naive_utc()),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl FieldType for DateTime<FixedOffset> {
    fn data_type() -> DataType {
        DataType::DateTimeOffset
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::TimestampTz(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(DateTime::<FixedOffset>::default()),
            OwnedValue::TimestampTz(ts) => Ok(ts),
            OwnedValue::Timestamp(ts) => Ok(ts.and_utc().fixed_offset()),
            other => Err(mismatch("DateTime<FixedOffset>", &other)),
        }
    }
}

impl FieldType for Uuid {
    fn data_type() -> DataType {
        DataType::Uuid
    }

    fn to_value(&self) -> OwnedValue {
        OwnedValue::Uuid(*self)
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(Uuid::nil()),
            OwnedValue::Uuid(u) => Ok(u),
            OwnedValue::Text(s) => parse_uuid(&s),
            other => Err(mismatch("Uuid", &other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn data_type() -> DataType {
        T::data_type()
    }

    fn is_optional() -> bool {
        true
    }

    fn to_value(&self) -> OwnedValue {
        match self {
            Some(inner) => inner.to_value(),
            None => OwnedValue::Null,
        }
    }

    fn from_value(value: OwnedValue) -> Result<Self> {
        match value {
            OwnedValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reads_as_default() {
        assert_eq!(i32::from_value(OwnedValue::Null).unwrap(), 0);
        assert_eq!(String::from_value(OwnedValue::Null).unwrap(), "");
        assert_eq!(Uuid::from_value(OwnedValue::Null).unwrap(), Uuid::nil());
        assert_eq!(Option::<i32>::from_value(OwnedValue::Null).unwrap(), None);
    }

    #[test]
    fn integers_reject_out_of_range() {
        assert!(u8::from_value(OwnedValue::Int(256)).is_err());
        assert!(i16::from_value(OwnedValue::Int(-40_000)).is_err());
        assert_eq!(u32::from_value(OwnedValue::Int(4_000_000_000)).unwrap(), 4_000_000_000);
    }

    #[test]
    fn option_unwraps_to_inner_type() {
        assert_eq!(Option::<u16>::data_type(), DataType::UInt16);
        assert!(Option::<u16>::is_optional());
        assert!(!u16::is_optional());
        assert_eq!(Some(7i64).to_value(), OwnedValue::Int(7));
    }

    #[test]
    fn mismatched_values_fail() {
        let err = i64::from_value(OwnedValue::Text("x".into())).unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedType(_)));
    }
}
