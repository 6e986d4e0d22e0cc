//! Fixed-point decimal stored as `digits * 10^-scale`.
//!
//! The engine has no decimal storage class, so decimals are bound and read as
//! doubles. Narrowing a double back to a `Decimal` goes through its shortest
//! round-trip text form, which keeps values such as `0.1` exact.

use std::fmt;

use crate::error::{OrmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    digits: i128,
    scale: i16,
}

const MAX_SCALE: usize = 28;

impl Decimal {
    pub fn new(digits: i128, scale: i16) -> Self {
        Self { digits, scale }
    }

    pub fn digits(&self) -> i128 {
        self.digits
    }

    pub fn scale(&self) -> i16 {
        self.scale
    }

    pub fn to_f64(&self) -> f64 {
        self.digits as f64 / 10f64.powi(i32::from(self.scale))
    }
}

impl TryFrom<f64> for Decimal {
    type Error = OrmError;

    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(OrmError::UnsupportedType(format!(
                "{} has no decimal representation",
                value
            )));
        }

        let text = format!("{}", value);
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.as_str()),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let frac_part = &frac_part[..frac_part.len().min(MAX_SCALE)];

        let mut combined = String::with_capacity(int_part.len() + frac_part.len());
        combined.push_str(int_part);
        combined.push_str(frac_part);

        let magnitude: i128 = combined.parse().map_err(|_| {
            OrmError::UnsupportedType(format!("{} is out of range for decimal", value))
        })?;
        let digits = if negative { -magnitude } else { magnitude };

        Ok(Self {
            digits,
            scale: frac_part.len() as i16,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_decimal(self.digits, self.scale))
    }
}

fn format_decimal(digits: i128, scale: i16) -> String {
    if scale <= 0 {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        return if digits == 0 {
            "0".to_string()
        } else {
            format!("{}{}", digits, zeros)
        };
    }

    let magnitude = digits.unsigned_abs();
    let sign = if digits < 0 { "-" } else { "" };
    // Past 10^38 the divisor overflows u128, and every i128 is below it.
    let (whole, fraction) = match 10u128.checked_pow(scale as u32) {
        Some(divisor) => (magnitude / divisor, magnitude % divisor),
        None => (0, magnitude),
    };
    format!("{}{}.{:0>width$}", sign, whole, fraction, width = scale as usize)
}
