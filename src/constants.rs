//! OBD-II Protocol Constants
//!
//! This module defines constants used in the OBD-II diagnostics implementation,
//! based on the SAE J1979 standard and the ELM327 command set.

/// Diagnostic mode: current (live) data
pub const MODE_CURRENT_DATA: u8 = 0x01;

/// Diagnostic mode: freeze frame data
pub const MODE_FREEZE_FRAME: u8 = 0x02;

/// Diagnostic mode: stored diagnostic trouble codes
pub const MODE_STORED_DTC: u8 = 0x03;

/// Diagnostic mode: clear trouble codes and stored values
pub const MODE_CLEAR_DTC: u8 = 0x04;

/// Diagnostic mode: on-board monitoring test results
pub const MODE_TEST_RESULTS: u8 = 0x06;

/// Diagnostic mode: pending diagnostic trouble codes
pub const MODE_PENDING_DTC: u8 = 0x07;

/// Diagnostic mode: vehicle information
pub const MODE_VEHICLE_INFO: u8 = 0x09;

/// Offset added to the request mode in positive replies (mode 01 answers as 0x41)
pub const REPLY_MODE_OFFSET: u8 = 0x40;

/// ELM327 protocol identifiers for the ISO 15765-4 CAN variants.
///
/// Mode 06 queries and batched multi-PID requests are only defined over these.
pub const CAN_PROTOCOL_IDS: [&str; 4] = ["6", "7", "8", "9"];

/// Number of subsequent PIDs described by one PID-listing bitmap reply
pub const PID_BITMAP_WIDTH: usize = 32;

/// Upper bound on commands per batched multi-PID request.
///
/// The ELM327 request line tops out at one mode token plus six PID tokens.
pub const MAX_BATCH_COMMANDS: usize = 6;

/// Default serial baud rate for ELM327 adapters
pub const DEFAULT_BAUDRATE: u32 = 38_400;

/// Command terminator expected by the adapter
pub const ELM_CR: u8 = b'\r';

/// Prompt byte the adapter emits when it is ready for the next command
pub const ELM_PROMPT: u8 = b'>';

/// Returns true for the bus-protocol identifiers that belong to the CAN family.
pub fn is_can_protocol(protocol_id: &str) -> bool {
    CAN_PROTOCOL_IDS.contains(&protocol_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_protocol_membership() {
        for id in ["6", "7", "8", "9"] {
            assert!(is_can_protocol(id));
        }
        for id in ["", "1", "5", "A", "66"] {
            assert!(!is_can_protocol(id));
        }
    }
}
