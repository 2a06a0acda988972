//! Decoded query responses.
//!
//! Every logical query produces exactly one [`Response`]: either null (the
//! vehicle had nothing to say, the command was unsupported, or decoding
//! failed) or a decoded [`Value`] plus the originating command.

use crate::obd2::command::Command;
use serde::Serialize;
use std::time::SystemTime;

/// A fixed-width sequence of support bits, as returned by PID-listing
/// commands.
///
/// Bit 0 is the most significant bit of the first payload byte and describes
/// the parameter one past the listing command's own PID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitArray {
    bits: Vec<bool>,
}

impl BitArray {
    /// Expand payload bytes into bits, most significant bit first.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(data.len() * 8);
        for byte in data {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1 == 1);
            }
        }
        BitArray { bits }
    }

    /// Whether bit `i` is set; out-of-range positions read as unset.
    pub fn is_set(&self, i: usize) -> bool {
        self.bits.get(i).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Iterate over the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }
}

/// Represents the value of a decoded response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// A scalar reading (engine speed, temperature, ...); the unit lives on
    /// the [`Response`].
    Numeric(f64),
    /// A support bitmap from a PID-listing command.
    Bits(BitArray),
    /// Diagnostic trouble codes, e.g. `"P0133"`.
    Codes(Vec<String>),
    /// Raw passthrough for parameters without a numeric interpretation.
    Raw(Vec<u8>),
}

impl Value {
    /// The scalar reading, if this value is numeric.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// The support bitmap, if this value is one.
    pub fn as_bits(&self) -> Option<&BitArray> {
        match self {
            Value::Bits(bits) => Some(bits),
            _ => None,
        }
    }
}

/// The result of one logical query.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// The originating command, absent on null responses.
    pub command: Option<Command>,
    /// The decoded value, absent on null responses.
    pub value: Option<Value>,
    /// Unit of a numeric value, empty otherwise.
    pub unit: &'static str,
    /// When the reply was decoded.
    pub timestamp: Option<SystemTime>,
}

impl Response {
    /// The null response: no data.
    pub fn null() -> Self {
        Response {
            command: None,
            value: None,
            unit: "",
            timestamp: None,
        }
    }

    /// A populated response for `command`.
    pub fn new(command: &Command, value: Value, unit: &'static str) -> Self {
        Response {
            command: Some(command.clone()),
            value: Some(value),
            unit,
            timestamp: Some(SystemTime::now()),
        }
    }

    /// True when the query produced no usable data.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

impl Default for Response {
    fn default() -> Self {
        Response::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitarray_msb_first() {
        let bits = BitArray::from_bytes(&[0b1000_0001, 0x00]);
        assert_eq!(bits.len(), 16);
        assert!(bits.is_set(0));
        assert!(bits.is_set(7));
        assert!(!bits.is_set(1));
        assert!(!bits.is_set(8));
        assert!(!bits.is_set(100));
    }

    #[test]
    fn test_null_response() {
        let response = Response::null();
        assert!(response.is_null());
        assert!(response.command.is_none());
        assert!(response.timestamp.is_none());
    }
}
