//! Connection status tiers for an OBD-II session.

use serde::Serialize;

/// Represents how far a diagnostics session has come up.
///
/// The tiers are ordered: an adapter can be reachable on the serial side
/// (`ElmConnected`) without the vehicle bus answering yet (`CarConnected`).
/// Command discovery and querying require `CarConnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConnectionStatus {
    /// No adapter handle is held, or the adapter never answered.
    NotConnected,
    /// The ELM327 adapter completed its AT handshake; the vehicle has not
    /// been confirmed.
    ElmConnected,
    /// The vehicle bus responded to a live-data probe.
    CarConnected,
}

impl ConnectionStatus {
    /// Human-readable form for log lines and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "Not Connected",
            ConnectionStatus::ElmConnected => "ELM Connected",
            ConnectionStatus::CarConnected => "Car Connected",
        }
    }
}
