//! # Hex Encoding/Decoding Utilities
//!
//! OBD-II requests and replies travel as ASCII-hex text on the adapter link:
//! a request like mode 01 PID 0C is the four bytes `b"010C"`, and reply lines
//! arrive as hex pairs optionally separated by spaces (`"41 0C 1A F8"`).
//! This module wraps the `hex` crate with the small domain helpers both
//! directions need.

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to an uppercase hex string.
///
/// Request templates are uppercase by convention (`"010C"`), matching what
/// ELM327 adapters echo back.
pub fn encode_hex_upper(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode a reply line that may contain spaces between byte pairs.
///
/// Accepts both upper- and lowercase hex; all whitespace is stripped before
/// decoding. Non-hex lines (prompts, status words) fail with `DecodeError`.
pub fn decode_hex_lenient(line: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = line.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format bytes as "41 0C 1A F8" for log lines.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Helper for creating test data from hex strings.
///
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex_str: &str) -> Vec<u8> {
    decode_hex_lenient(hex_str).expect("Invalid hex in test data")
}
