//! # Type Conversion Module
//!
//! The codec between semantic values and the engine's five storage classes.
//! Binding turns an `OwnedValue` into a statement parameter; reading turns a
//! result column back into an `OwnedValue` shaped for the target field.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Codec Flow                                      │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │   OwnedValue                        Engine storage class                 │
//! │   ──────────                        ────────────────────                 │
//! │   Bool / Int                 ───►   INTEGER                              │
//! │   Float / Decimal            ───►   REAL                                 │
//! │   Text / Uuid                ───►   TEXT                                 │
//! │   Blob                       ───►   BLOB                                 │
//! │   Interval                   ───►   INTEGER (ticks)                      │
//! │   TimestampTz                ───►   INTEGER (UTC ticks)                  │
//! │   Timestamp                  ───►   INTEGER (ticks) or TEXT (ISO 8601)   │
//! │                                                                          │
//! │   Result column + DataType   ───►   OwnedValue for the field             │
//! │                                                                          │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ticks
//!
//! Durations and timestamps are stored as ticks: 100 ns units. Timestamps
//! count from 0001-01-01T00:00:00 UTC; text timestamps use ISO 8601 with nine
//! fractional digits so they sort lexically.
//!
//! ## Key Functions
//!
//! - `to_sql` / `to_sql_host`: parameter values as `rusqlite::types::ToSqlOutput`
//! - `read_column`: typed read of a `ValueRef`, driven by a column's `DataType`
//! - `read_dynamic`: untyped read driven by the storage class
//! - `datetime_to_ticks` / `ticks_to_datetime`, `duration_to_ticks` / `ticks_to_duration`

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};

use crate::error::{OrmError, Result};
use crate::types::{parse_uuid, DataType, Decimal, HostValue, OwnedValue};

pub const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
/// Ticks between 0001-01-01T00:00:00 and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";
const DATETIME_PARSE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn out_of_range(what: &str) -> OrmError {
    OrmError::UnsupportedType(format!("{} is out of range for tick storage", what))
}

pub fn datetime_to_ticks(value: &NaiveDateTime) -> Result<i64> {
    let utc = value.and_utc();
    utc.timestamp()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(i64::from(utc.timestamp_subsec_nanos()) / NANOS_PER_TICK))
        .and_then(|t| t.checked_add(UNIX_EPOCH_TICKS))
        .ok_or_else(|| out_of_range(&value.to_string()))
}

pub fn ticks_to_datetime(ticks: i64) -> Result<NaiveDateTime> {
    let relative = ticks
        .checked_sub(UNIX_EPOCH_TICKS)
        .ok_or_else(|| out_of_range(&ticks.to_string()))?;
    let secs = relative.div_euclid(TICKS_PER_SECOND);
    let nanos = (relative.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| out_of_range(&ticks.to_string()))
}

pub fn duration_to_ticks(value: &TimeDelta) -> Result<i64> {
    value
        .num_seconds()
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(i64::from(value.subsec_nanos()) / NANOS_PER_TICK))
        .ok_or_else(|| out_of_range(&value.to_string()))
}

pub fn ticks_to_duration(ticks: i64) -> TimeDelta {
    TimeDelta::seconds(ticks.div_euclid(TICKS_PER_SECOND))
        + TimeDelta::nanoseconds(ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK)
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in DATETIME_PARSE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(OrmError::UnsupportedType(format!(
        "'{}' is not a recognized datetime",
        text
    )))
}

/// Engine value for a statement parameter.
pub(crate) fn to_sql_host(value: &HostValue, store_timestamps_as_ticks: bool) -> Result<ToSqlOutput<'_>> {
    match value {
        HostValue::Scalar(v) => to_sql(v, store_timestamps_as_ticks),
        other => Err(OrmError::UnsupportedType(format!(
            "cannot bind a {} as a statement parameter",
            other.kind()
        ))),
    }
}

pub(crate) fn to_sql(value: &OwnedValue, store_timestamps_as_ticks: bool) -> Result<ToSqlOutput<'_>> {
    let output = match value {
        OwnedValue::Null => ToSqlOutput::Owned(Value::Null),
        OwnedValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
        OwnedValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
        OwnedValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
        OwnedValue::Decimal(d) => ToSqlOutput::Owned(Value::Real(d.to_f64())),
        OwnedValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        OwnedValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        OwnedValue::Timestamp(ts) => {
            if store_timestamps_as_ticks {
                ToSqlOutput::Owned(Value::Integer(datetime_to_ticks(ts)?))
            } else {
                ToSqlOutput::Owned(Value::Text(format_datetime(ts)))
            }
        }
        OwnedValue::TimestampTz(ts) => ToSqlOutput::Owned(Value::Integer(datetime_to_ticks(&ts.naive_utc())?)),
        OwnedValue::Interval(d) => ToSqlOutput::Owned(Value::Integer(duration_to_ticks(d)?)),
        OwnedValue::Uuid(u) => ToSqlOutput::Owned(Value::Text(u.hyphenated().to_string())),
    };
    Ok(output)
}

fn int_of(value: ValueRef<'_>) -> i64 {
    match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
        ValueRef::Null | ValueRef::Blob(_) => 0,
    }
}

fn float_of(value: ValueRef<'_>) -> f64 {
    match value {
        ValueRef::Integer(i) => i as f64,
        ValueRef::Real(f) => f,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0),
        ValueRef::Null | ValueRef::Blob(_) => 0.0,
    }
}

fn text_of(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Null => String::new(),
    }
}

fn blob_of(value: ValueRef<'_>) -> Vec<u8> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
        ValueRef::Integer(_) | ValueRef::Real(_) => text_of(value).into_bytes(),
        ValueRef::Null => Vec::new(),
    }
}

/// Reads one result value as `data_type`.
pub(crate) fn read_column(value: ValueRef<'_>, data_type: DataType) -> Result<OwnedValue> {
    if value == ValueRef::Null {
        return Ok(OwnedValue::Null);
    }

    let value = match data_type {
        DataType::Bool => OwnedValue::Bool(int_of(value) == 1),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Int64
        | DataType::Enum => OwnedValue::Int(int_of(value)),
        DataType::Float32 | DataType::Float64 => OwnedValue::Float(float_of(value)),
        DataType::Decimal => OwnedValue::Decimal(Decimal::try_from(float_of(value))?),
        DataType::Text => OwnedValue::Text(text_of(value)),
        DataType::Blob => OwnedValue::Blob(blob_of(value)),
        DataType::Duration => OwnedValue::Interval(ticks_to_duration(int_of(value))),
        DataType::DateTime => match value {
            ValueRef::Text(_) => OwnedValue::Timestamp(parse_datetime(&text_of(value))?),
            _ => OwnedValue::Timestamp(ticks_to_datetime(int_of(value))?),
        },
        DataType::DateTimeOffset => {
            let utc = ticks_to_datetime(int_of(value))?;
            OwnedValue::TimestampTz(utc.and_utc().fixed_offset())
        }
        DataType::Uuid => OwnedValue::Uuid(parse_uuid(&text_of(value))?),
        DataType::Unsupported(name) => {
            return Err(OrmError::UnsupportedType(format!(
                "cannot read a column into {}",
                name
            )))
        }
    };
    Ok(value)
}

/// Reads one result value by its storage class.
pub(crate) fn read_dynamic(value: ValueRef<'_>) -> OwnedValue {
    match value {
        ValueRef::Integer(i) => OwnedValue::Int(i),
        ValueRef::Real(f) => OwnedValue::Float(f),
        ValueRef::Text(_) => OwnedValue::Text(text_of(value)),
        ValueRef::Blob(b) => OwnedValue::Blob(b.to_vec()),
        ValueRef::Null => OwnedValue::Null,
    }
}
