//! # Utility Modules
//!
//! Common helpers used throughout the obd2-rs crate, currently the ASCII-hex
//! encoding/decoding routines used by request building, log formatting, and
//! test tooling.

pub mod hex;

pub use hex::{decode_hex_lenient, encode_hex_upper, format_hex_compact, hex_to_bytes};
