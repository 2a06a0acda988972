//! # OBD-II Error Handling
//!
//! This module defines the Obd2Error enum, which represents the different error
//! types that can occur in the obd2-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the OBD-II crate.
#[derive(Debug, Error)]
pub enum Obd2Error {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPort(String),

    /// Indicates that no candidate adapter ports were found during scanning.
    #[error("No OBD-II adapter ports found")]
    NoAdaptersFound,

    /// Indicates the adapter did not answer before the deadline.
    #[error("Timed out waiting for adapter response")]
    Timeout,

    /// Indicates an AT command was rejected by the adapter.
    #[error("Adapter rejected command {command:?}: {reply}")]
    AtCommandFailed { command: String, reply: String },

    /// Indicates an error when parsing an adapter reply.
    #[error("Error parsing adapter reply: {0}")]
    ResponseParse(String),

    /// Indicates an invalid hexadecimal string was received.
    #[error("Invalid hexadecimal string")]
    InvalidHexString,

    /// Indicates an operation that requires a connection was attempted without one.
    #[error("Not connected")]
    NotConnected,

    /// A catch-all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}
