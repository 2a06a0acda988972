//! # obd2-rs - A Rust Crate for OBD-II Vehicle Diagnostics
//!
//! The obd2-rs crate talks to a vehicle's diagnostic bus through an
//! ELM327-compatible serial adapter: it turns typed diagnostic commands into
//! request strings, sends them over the adapter link, and turns the reply
//! frames back into typed values.
//!
//! ## Features
//!
//! - Connect to an ELM327 adapter on an explicit serial port or by scanning
//!   for candidates
//! - Discover which diagnostic parameters the vehicle supports by decoding
//!   PID bitmap replies
//! - Query live data, freeze frames and stored trouble codes through a fixed
//!   command catalog with per-parameter decoders
//! - Speed up repeated queries with reply-frame-count memoization and
//!   repeat-request elision
//! - Batch up to six same-mode commands into one CAN request and reassemble
//!   the concatenated reply into per-command responses
//! - Support for logging and error handling
//!
//! ## Usage
//!
//! ```no_run
//! use obd2_rs::{commands, ConnectOptions, Obd2};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut session = Obd2::connect(ConnectOptions::default()).await;
//!     if session.is_connected() {
//!         let rpm = commands::registry().by_name("RPM").unwrap();
//!         let response = session.query(rpm, false).await;
//!         println!("{:?} {}", response.value, response.unit);
//!     }
//!     session.close().await;
//! }
//! ```

pub mod constants;
pub mod error;
pub mod logging;
pub mod obd2;
pub mod util;

pub use crate::error::Obd2Error;
pub use crate::logging::{init_logger, log_info};

// Core OBD-II types
pub use obd2::commands;
pub use obd2::{
    registry, scan_ports, AdapterTransport, BitArray, BusProtocol, Command, CommandKey,
    CommandRegistry, ConnectOptions, ConnectionStatus, Elm327, Frame, Message, Obd2, Response,
    Value,
};

/// Establish a session by scanning for adapter ports.
///
/// Connection failure is signalled through [`Obd2::status`], not an error.
pub async fn connect() -> Obd2 {
    Obd2::connect(ConnectOptions::default()).await
}

/// Establish a session on an explicit serial port.
pub async fn connect_port(port: &str) -> Obd2 {
    Obd2::connect(ConnectOptions {
        port: Some(port.to_string()),
        ..ConnectOptions::default()
    })
    .await
}
