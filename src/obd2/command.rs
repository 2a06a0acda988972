//! # Diagnostic Commands
//!
//! A [`Command`] is an immutable descriptor drawn from the registry: its
//! mode/PID identity, the expected reply length, the fast-mode eligibility
//! flag, the ASCII-hex request template, and a decoder handle.
//!
//! Commands are compared and hashed by identity `(mode, pid)` only: two
//! values with the same identity are interchangeable, which is what lets the
//! session key its frame-count memo and the supported-command set on them.

use crate::constants::REPLY_MODE_OFFSET;
use crate::obd2::decoders::Decoder;
use crate::obd2::protocol::Message;
use crate::obd2::response::Response;
use crate::util::hex::encode_hex_upper;
use log::debug;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The stable identity of a command: mode plus parameter identifier.
///
/// Commands without a parameter identifier (the mode 03/04/07 DTC services)
/// carry `pid: None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub mode: u8,
    pub pid: Option<u8>,
}

/// An immutable diagnostic command.
#[derive(Clone)]
pub struct Command {
    /// Short registry name, e.g. `"RPM"`.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Diagnostic service mode.
    pub mode: u8,
    /// Parameter identifier within the mode, if the mode uses one.
    pub pid: Option<u8>,
    /// Expected reply length in bytes, including the PID echo byte but not
    /// the mode echo byte. Zero for variable-length replies.
    pub bytes: usize,
    /// Whether the reply-frame-count optimization applies to this command.
    pub fast: bool,
    /// ASCII-hex request template, e.g. `b"010C"`.
    command: Vec<u8>,
    decoder: &'static dyn Decoder,
}

impl Command {
    pub fn new(
        name: &'static str,
        description: &'static str,
        mode: u8,
        pid: Option<u8>,
        bytes: usize,
        fast: bool,
        decoder: &'static dyn Decoder,
    ) -> Self {
        let command = match pid {
            Some(pid) => encode_hex_upper(&[mode, pid]).into_bytes(),
            None => encode_hex_upper(&[mode]).into_bytes(),
        };
        Command {
            name,
            description,
            mode,
            pid,
            bytes,
            fast,
            command,
            decoder,
        }
    }

    /// The decoder handle, for registry-internal derivation of command
    /// variants that share a decoder.
    pub(crate) fn decoder(&self) -> &'static dyn Decoder {
        self.decoder
    }

    /// The identity key used by memo tables and the supported set.
    pub fn key(&self) -> CommandKey {
        CommandKey {
            mode: self.mode,
            pid: self.pid,
        }
    }

    /// The request template bytes to transmit.
    pub fn request(&self) -> &[u8] {
        &self.command
    }

    /// The mode token of the request template (first two ASCII-hex chars).
    pub fn mode_token(&self) -> &[u8] {
        &self.command[..2]
    }

    /// The PID token of the request template (the part after the mode),
    /// empty for commands without a parameter identifier.
    pub fn pid_token(&self) -> &[u8] {
        &self.command[2..]
    }

    /// Decode reply messages into a [`Response`].
    ///
    /// The first message carries the answer; its payload must echo this
    /// command's mode (offset by 0x40) and PID before the decoder sees the
    /// remaining bytes. Anything else (a negative reply, an echo for a
    /// different parameter, an empty payload) is a null response.
    pub fn decode(&self, messages: &[Message]) -> Response {
        let Some(message) = messages.first() else {
            return Response::null();
        };
        let Some(payload) = self.strip_echo(&message.data) else {
            debug!(
                "{}: reply {:02X?} does not answer this command",
                self.name, message.data
            );
            return Response::null();
        };
        match self.decoder.decode(payload) {
            Some(value) => Response::new(self, value, self.decoder.unit()),
            None => Response::null(),
        }
    }

    /// Validate and strip the mode (and PID) echo bytes from a reply payload.
    fn strip_echo<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let (&mode_echo, rest) = data.split_first()?;
        if mode_echo != (self.mode | REPLY_MODE_OFFSET) {
            return None;
        }
        match self.pid {
            Some(pid) => {
                let (&pid_echo, rest) = rest.split_first()?;
                (pid_echo == pid).then_some(rest)
            }
            None => Some(rest),
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("pid", &self.pid)
            .field("bytes", &self.bytes)
            .field("fast", &self.fast)
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{:02X}{:02X}: {}", self.mode, pid, self.description),
            None => write!(f, "{:02X}: {}", self.mode, self.description),
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Command", 4)?;
        s.serialize_field("name", self.name)?;
        s.serialize_field("mode", &self.mode)?;
        s.serialize_field("pid", &self.pid)?;
        s.serialize_field("bytes", &self.bytes)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obd2::decoders;
    use crate::obd2::protocol::Message;
    use crate::obd2::response::Value;
    use std::collections::HashSet;

    fn rpm() -> Command {
        Command::new("RPM", "Engine RPM", 0x01, Some(0x0C), 3, true, &decoders::RPM)
    }

    #[test]
    fn test_request_template() {
        let cmd = rpm();
        assert_eq!(cmd.request(), b"010C");
        assert_eq!(cmd.mode_token(), b"01");
        assert_eq!(cmd.pid_token(), b"0C");

        let dtc = Command::new(
            "GET_DTC",
            "Stored trouble codes",
            0x03,
            None,
            0,
            false,
            &decoders::TROUBLE_CODES,
        );
        assert_eq!(dtc.request(), b"03");
        assert!(dtc.pid_token().is_empty());
    }

    #[test]
    fn test_identity_equality() {
        let a = rpm();
        let b = Command::new(
            "RPM_ALIAS",
            "Same identity, different metadata",
            0x01,
            Some(0x0C),
            5,
            false,
            &decoders::RAW_BYTES,
        );
        let c = Command::new("SPEED", "Vehicle speed", 0x01, Some(0x0D), 2, true, &decoders::SPEED);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn test_decode_strips_echo() {
        let cmd = rpm();
        let message = Message::with_data(vec![], vec![0x41, 0x0C, 0x1A, 0xF8]);
        let response = cmd.decode(&[message]);
        assert_eq!(
            response.value.as_ref().and_then(Value::as_numeric),
            Some(1726.0)
        );
        assert_eq!(response.unit, "rpm");
        assert_eq!(response.command.as_ref().unwrap().name, "RPM");
    }

    #[test]
    fn test_decode_rejects_wrong_echo() {
        let cmd = rpm();
        // wrong PID echo
        let message = Message::with_data(vec![], vec![0x41, 0x0D, 0x1A, 0xF8]);
        assert!(cmd.decode(&[message]).is_null());
        // negative response service id
        let message = Message::with_data(vec![], vec![0x7F, 0x01, 0x12]);
        assert!(cmd.decode(&[message]).is_null());
        // no messages at all
        assert!(cmd.decode(&[]).is_null());
    }
}
