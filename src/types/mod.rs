//! # Value and Type System
//!
//! This module holds the types that flow between records, the expression
//! compiler and the codec.
//!
//! ## Module Structure
//!
//! - `data_type`: semantic `DataType`
//! - `owned_value`: `OwnedValue`, the field-level value currency
//! - `value`: `HostValue` constants and the `Members` trait
//! - `field`: `FieldType`, the bridge from Rust field types to `DataType`
//! - `decimal`: fixed-point `Decimal`
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `DataType` | Semantic type of a mapped field |
//! | `OwnedValue` | Single field value (bind/read/getter/setter) |
//! | `HostValue` | Expression constant: scalar, list or object |
//! | `FieldType` | Rust type ↔ `DataType` ↔ `OwnedValue` |
//!
//! ## Usage
//!
//! ```ignore
//! use turorm::types::{DataType, FieldType, OwnedValue};
//!
//! assert_eq!(<Option<i32>>::data_type(), DataType::Int32);
//! assert_eq!(42i32.to_value(), OwnedValue::Int(42));
//! ```

mod data_type;
mod decimal;
mod field;
mod owned_value;
mod value;

pub use data_type::DataType;
pub use decimal::Decimal;
pub use field::FieldType;
pub(crate) use owned_value::parse_uuid;
pub use owned_value::OwnedValue;
pub use value::{HostValue, Members};
