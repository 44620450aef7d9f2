//! Quantity normalization for stock input.
//!
//! Stock quantities arrive from forms, CSV imports and stored documents in
//! whatever shape the producer used. Every stock-mutating boundary runs them
//! through [`normalize_quantity`]: convert to an integer, and substitute 0 on
//! failure or a negative result. Malformed input is never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::size::SizeKey;

/// Normalize an arbitrary JSON value into a non-negative stock quantity.
///
/// - integers are clamped at 0
/// - finite floats are floored, then clamped at 0
/// - strings are read like a leading-integer parse (`"12abc"` is 12, `"3.7"` is 3)
/// - everything else (null, bool, arrays, objects, NaN) is 0
pub fn normalize_quantity(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if n.as_i64().is_some() {
                // Any i64 that is not a u64 is negative.
                0
            } else {
                n.as_f64().map(floor_to_quantity).unwrap_or(0)
            }
        }
        Value::String(s) => parse_leading_integer(s),
        _ => 0,
    }
}

fn floor_to_quantity(f: f64) -> u64 {
    if !f.is_finite() || f <= 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX for out-of-range floats.
    f.floor() as u64
}

fn parse_leading_integer(raw: &str) -> u64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: u64 = 0;
    let mut seen_digit = false;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen_digit = true;
        value = value.saturating_mul(10).saturating_add(u64::from(b - b'0'));
    }

    if !seen_digit || negative { 0 } else { value }
}

/// A proposed full-record replacement where each size may be absent.
///
/// Absent sizes keep their currently stored value; present sizes are
/// normalized with [`normalize_quantity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposedStock {
    #[serde(rename = "S", default, skip_serializing_if = "Option::is_none")]
    pub s: Option<Value>,
    #[serde(rename = "M", default, skip_serializing_if = "Option::is_none")]
    pub m: Option<Value>,
    #[serde(rename = "L", default, skip_serializing_if = "Option::is_none")]
    pub l: Option<Value>,
    #[serde(rename = "XL", default, skip_serializing_if = "Option::is_none")]
    pub xl: Option<Value>,
}

impl ProposedStock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for one size.
    pub fn with(mut self, size: SizeKey, value: impl Into<Value>) -> Self {
        *self.slot_mut(size) = Some(value.into());
        self
    }

    pub fn get(&self, size: SizeKey) -> Option<&Value> {
        match size {
            SizeKey::S => self.s.as_ref(),
            SizeKey::M => self.m.as_ref(),
            SizeKey::L => self.l.as_ref(),
            SizeKey::XL => self.xl.as_ref(),
        }
    }

    fn slot_mut(&mut self, size: SizeKey) -> &mut Option<Value> {
        match size {
            SizeKey::S => &mut self.s,
            SizeKey::M => &mut self.m,
            SizeKey::L => &mut self.l,
            SizeKey::XL => &mut self.xl,
        }
    }
}
