//! # Heap-Owned Value Representation
//!
//! `OwnedValue` is the single currency between record fields, the expression
//! compiler and the codec. Field getters produce it, field setters consume it,
//! the codec binds it to statement parameters and reads it back from result
//! columns.
//!
//! ## Design
//!
//! Values are semantic, not storage-shaped: a `Timestamp` stays a
//! `NaiveDateTime` until the codec decides between ticks and text according to
//! the connection's storage policy. That keeps records independent of how a
//! particular database file was configured.
//!
//! ## Coercion
//!
//! `coerce_to` implements the numeric and textual conversions a `Convert` node
//! asks for:
//!
//! ```ignore
//! let v = OwnedValue::Int(3).coerce_to(DataType::Float64)?;
//! assert_eq!(v, OwnedValue::Float(3.0));
//! ```

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::{DataType, Decimal};
use crate::error::{OrmError, Result};

/// Fully-owned field value.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Interval(TimeDelta),
    Uuid(Uuid),
}

impl OwnedValue {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, OwnedValue::Null)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OwnedValue::Text(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            OwnedValue::Null => "null",
            OwnedValue::Bool(_) => "bool",
            OwnedValue::Int(_) => "integer",
            OwnedValue::Float(_) => "float",
            OwnedValue::Decimal(_) => "decimal",
            OwnedValue::Text(_) => "text",
            OwnedValue::Blob(_) => "blob",
            OwnedValue::Timestamp(_) => "timestamp",
            OwnedValue::TimestampTz(_) => "timestamp with offset",
            OwnedValue::Interval(_) => "interval",
            OwnedValue::Uuid(_) => "uuid",
        }
    }

    pub fn display_string(&self) -> String {
        match self {
            OwnedValue::Null => "NULL".to_string(),
            OwnedValue::Bool(b) => b.to_string(),
            OwnedValue::Int(i) => i.to_string(),
            OwnedValue::Float(f) => f.to_string(),
            OwnedValue::Decimal(d) => d.to_string(),
            OwnedValue::Text(s) => s.clone(),
            OwnedValue::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("x'{}'", hex)
            }
            OwnedValue::Timestamp(ts) => ts.to_string(),
            OwnedValue::TimestampTz(ts) => ts.to_rfc3339(),
            OwnedValue::Interval(d) => d.to_string(),
            OwnedValue::Uuid(u) => u.hyphenated().to_string(),
        }
    }

    /// Converts this value toward `target`. NULL stays NULL; values already
    /// of a compatible shape pass through unchanged.
    pub fn coerce_to(self, target: DataType) -> Result<OwnedValue> {
        let coerced = match (self, target) {
            (OwnedValue::Null, _) => OwnedValue::Null,

            (OwnedValue::Bool(b), DataType::Bool) => OwnedValue::Bool(b),
            (OwnedValue::Int(i), DataType::Bool) => OwnedValue::Bool(i != 0),
            (OwnedValue::Float(f), DataType::Bool) => OwnedValue::Bool(f != 0.0),

            (OwnedValue::Bool(b), t) if is_integral(t) => OwnedValue::Int(i64::from(b)),
            (OwnedValue::Int(i), t) if is_integral(t) => OwnedValue::Int(check_range(i, t)?),
            (OwnedValue::Float(f), t) if is_integral(t) => {
                let rounded = f.round_ties_even();
                if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                    return Err(OrmError::UnsupportedType(format!(
                        "{} is out of range for {}",
                        f, t
                    )));
                }
                OwnedValue::Int(check_range(rounded as i64, t)?)
            }
            (OwnedValue::Decimal(d), t) if is_integral(t) => {
                OwnedValue::Int(check_range(d.to_f64().round_ties_even() as i64, t)?)
            }

            (OwnedValue::Int(i), DataType::Float32 | DataType::Float64) => OwnedValue::Float(i as f64),
            (OwnedValue::Bool(b), DataType::Float32 | DataType::Float64) => {
                OwnedValue::Float(if b { 1.0 } else { 0.0 })
            }
            (OwnedValue::Decimal(d), DataType::Float32 | DataType::Float64) => OwnedValue::Float(d.to_f64()),
            (OwnedValue::Float(f), DataType::Float32) => OwnedValue::Float(f64::from(f as f32)),

            (OwnedValue::Int(i), DataType::Decimal) => OwnedValue::Decimal(Decimal::new(i128::from(i), 0)),
            (OwnedValue::Float(f), DataType::Decimal) => OwnedValue::Decimal(Decimal::try_from(f)?),

            (OwnedValue::Text(s), DataType::Uuid) => OwnedValue::Uuid(parse_uuid(&s)?),
            (OwnedValue::Text(s), DataType::Text) => OwnedValue::Text(s),
            (other, DataType::Text) => OwnedValue::Text(other.display_string()),

            (OwnedValue::TimestampTz(ts), DataType::DateTime) => OwnedValue::Timestamp(ts.naive_utc()),
            (OwnedValue::Timestamp(ts), DataType::DateTimeOffset) => {
                OwnedValue::TimestampTz(ts.and_utc().fixed_offset())
            }

            (other, _) => other,
        };
        Ok(coerced)
    }
}

fn is_integral(target: DataType) -> bool {
    target.is_integer() || matches!(target, DataType::Enum)
}

fn check_range(value: i64, target: DataType) -> Result<i64> {
    let (min, max) = match target {
        DataType::Int8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
        DataType::Int16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        DataType::Int32 | DataType::Enum => (i64::from(i32::MIN), i64::from(i32::MAX)),
        DataType::UInt8 => (0, i64::from(u8::MAX)),
        DataType::UInt16 => (0, i64::from(u16::MAX)),
        DataType::UInt32 => (0, i64::from(u32::MAX)),
        _ => (i64::MIN, i64::MAX),
    };
    if value < min || value > max {
        return Err(OrmError::UnsupportedType(format!(
            "{} is out of range for {}",
            value, target
        )));
    }
    Ok(value)
}

pub(crate) fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| OrmError::UnsupportedType(format!("'{}' is not a valid uuid: {}", text, e)))
}

macro_rules! owned_value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for OwnedValue {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

owned_value_from! {
    bool => |v| OwnedValue::Bool(v),
    i8 => |v| OwnedValue::Int(i64::from(v)),
    i16 => |v| OwnedValue::Int(i64::from(v)),
    i32 => |v| OwnedValue::Int(i64::from(v)),
    i64 => |v| OwnedValue::Int(v),
    u8 => |v| OwnedValue::Int(i64::from(v)),
    u16 => |v| OwnedValue::Int(i64::from(v)),
    u32 => |v| OwnedValue::Int(i64::from(v)),
    f32 => |v| OwnedValue::Float(f64::from(v)),
    f64 => |v| OwnedValue::Float(v),
    Decimal => |v| OwnedValue::Decimal(v),
    String => |v| OwnedValue::Text(v),
    &str => |v| OwnedValue::Text(v.to_string()),
    &String => |v| OwnedValue::Text(v.clone()),
    Vec<u8> => |v| OwnedValue::Blob(v),
    &[u8] => |v| OwnedValue::Blob(v.to_vec()),
    NaiveDateTime => |v| OwnedValue::Timestamp(v),
    DateTime<FixedOffset> => |v| OwnedValue::TimestampTz(v),
    DateTime<Utc> => |v| OwnedValue::TimestampTz(v.fixed_offset()),
    TimeDelta => |v| OwnedValue::Interval(v),
    Uuid => |v| OwnedValue::Uuid(v),
}

impl<T: Into<OwnedValue>> From<Option<T>> for OwnedValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => OwnedValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_survives_every_coercion() {
        for target in [DataType::Int32, DataType::Text, DataType::Uuid, DataType::Float64] {
            assert_eq!(OwnedValue::Null.coerce_to(target).unwrap(), OwnedValue::Null);
        }
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(
            OwnedValue::Int(3).coerce_to(DataType::Float64).unwrap(),
            OwnedValue::Float(3.0)
        );
        assert_eq!(
            OwnedValue::Float(2.5).coerce_to(DataType::Int32).unwrap(),
            OwnedValue::Int(2),
            "halfway values round to even"
        );
        assert_eq!(
            OwnedValue::Bool(true).coerce_to(DataType::Int64).unwrap(),
            OwnedValue::Int(1)
        );
        assert_eq!(
            OwnedValue::Int(0).coerce_to(DataType::Bool).unwrap(),
            OwnedValue::Bool(false)
        );
    }

    #[test]
    fn narrowing_checks_range() {
        assert!(OwnedValue::Int(300).coerce_to(DataType::UInt8).is_err());
        assert!(OwnedValue::Int(-1).coerce_to(DataType::UInt32).is_err());
        assert_eq!(
            OwnedValue::Int(255).coerce_to(DataType::UInt8).unwrap(),
            OwnedValue::Int(255)
        );
    }

    #[test]
    fn text_parses_to_uuid() {
        let id = Uuid::new_v4();
        let text = OwnedValue::Text(id.hyphenated().to_string());
        assert_eq!(text.coerce_to(DataType::Uuid).unwrap(), OwnedValue::Uuid(id));
        assert!(OwnedValue::Text("nope".into()).coerce_to(DataType::Uuid).is_err());
    }

    #[test]
    fn option_none_is_null() {
        let v: OwnedValue = Option::<i32>::None.into();
        assert!(v.is_null());
        let v: OwnedValue = Some("x").into();
        assert_eq!(v, OwnedValue::Text("x".into()));
    }
}
