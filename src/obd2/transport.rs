//! # The Adapter Transport Boundary
//!
//! The session core talks to the adapter exclusively through the
//! [`AdapterTransport`] trait: a tiered status, the negotiated bus protocol,
//! and one synchronous "send request bytes, receive parsed messages"
//! operation. The production implementation is [`crate::obd2::elm327::Elm327`];
//! tests inject [`crate::obd2::transport_mock::MockTransport`].

use crate::error::Obd2Error;
use crate::obd2::protocol::Message;
use crate::obd2::status::ConnectionStatus;
use async_trait::async_trait;
use log::debug;

/// A live adapter link the session can issue requests through.
#[async_trait]
pub trait AdapterTransport: Send {
    /// Current connection tier.
    fn status(&self) -> ConnectionStatus;

    /// Identifier of the negotiated bus protocol ("1".."9", "A"), empty
    /// before negotiation.
    fn protocol_id(&self) -> String;

    /// Display name of the negotiated bus protocol.
    fn protocol_name(&self) -> String;

    /// Name of the underlying port.
    fn port_name(&self) -> String;

    /// Transmit `request` (an ASCII-hex command string; empty means "repeat
    /// the previous command") and return the parsed reply messages. A reply
    /// with no decodable payload is `Ok` with an empty vec, not an error.
    async fn send_and_parse(&mut self, request: &[u8]) -> Result<Vec<Message>, Obd2Error>;

    /// Release the link. Safe to call more than once.
    async fn close(&mut self);
}

/// Enumerate serial ports that plausibly host an OBD-II adapter.
///
/// USB serial bridges, CDC-ACM devices and Bluetooth RFCOMM bindings are
/// kept; console UARTs and the like are dropped. Results are sorted so the
/// connect loop probes candidates in a stable order.
pub fn scan_ports() -> Vec<String> {
    let ports = match tokio_serial::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Serial port enumeration failed: {e}");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = ports
        .into_iter()
        .map(|p| p.port_name)
        .filter(|name| is_adapter_candidate(name))
        .collect();
    names.sort();
    names
}

fn is_adapter_candidate(name: &str) -> bool {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.starts_with("ttyUSB")
        || base.starts_with("ttyACM")
        || base.starts_with("rfcomm")
        || base.starts_with("COM")
        || base.starts_with("cu.")
}
