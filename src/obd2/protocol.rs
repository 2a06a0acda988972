//! # Bus Protocol and Reply Framing
//!
//! This module covers the wire-adjacent data model: the ELM327 bus-protocol
//! table, the [`Frame`] and [`Message`] reply types, and the `nom` parser
//! that turns one adapter reply line into payload bytes.
//!
//! A reply [`Message`] is an ordered sequence of raw frames plus a derived
//! flat byte sequence (`data`) obtained by concatenating the frame payloads.
//! The session layer only ever reads `data` (and, for batched queries,
//! builds derived copies with truncated `data`); it never mutates frames.

use crate::constants::is_can_protocol;
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::space0,
    combinator::{all_consuming, map_res},
    multi::many1,
    sequence::{preceded, terminated},
    IResult,
};

/// The bus protocol variants an ELM327 can negotiate, keyed by the
/// identifier `ATDPN` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusProtocol {
    SaeJ1850Pwm,
    SaeJ1850Vpw,
    Iso9141_2,
    Iso14230_4Slow,
    Iso14230_4Fast,
    Iso15765_4Can11_500,
    Iso15765_4Can29_500,
    Iso15765_4Can11_250,
    Iso15765_4Can29_250,
    SaeJ1939,
}

impl BusProtocol {
    /// Look up a protocol by its ELM327 identifier ("1".."9", "A").
    pub fn from_id(id: &str) -> Option<BusProtocol> {
        match id {
            "1" => Some(BusProtocol::SaeJ1850Pwm),
            "2" => Some(BusProtocol::SaeJ1850Vpw),
            "3" => Some(BusProtocol::Iso9141_2),
            "4" => Some(BusProtocol::Iso14230_4Slow),
            "5" => Some(BusProtocol::Iso14230_4Fast),
            "6" => Some(BusProtocol::Iso15765_4Can11_500),
            "7" => Some(BusProtocol::Iso15765_4Can29_500),
            "8" => Some(BusProtocol::Iso15765_4Can11_250),
            "9" => Some(BusProtocol::Iso15765_4Can29_250),
            "A" => Some(BusProtocol::SaeJ1939),
            _ => None,
        }
    }

    /// The identifier `ATDPN` reports for this protocol.
    pub fn id(&self) -> &'static str {
        match self {
            BusProtocol::SaeJ1850Pwm => "1",
            BusProtocol::SaeJ1850Vpw => "2",
            BusProtocol::Iso9141_2 => "3",
            BusProtocol::Iso14230_4Slow => "4",
            BusProtocol::Iso14230_4Fast => "5",
            BusProtocol::Iso15765_4Can11_500 => "6",
            BusProtocol::Iso15765_4Can29_500 => "7",
            BusProtocol::Iso15765_4Can11_250 => "8",
            BusProtocol::Iso15765_4Can29_250 => "9",
            BusProtocol::SaeJ1939 => "A",
        }
    }

    /// Display name, matching the ELM327 `ATDP` wording.
    pub fn name(&self) -> &'static str {
        match self {
            BusProtocol::SaeJ1850Pwm => "SAE J1850 PWM",
            BusProtocol::SaeJ1850Vpw => "SAE J1850 VPW",
            BusProtocol::Iso9141_2 => "ISO 9141-2",
            BusProtocol::Iso14230_4Slow => "ISO 14230-4 (KWP 5BAUD)",
            BusProtocol::Iso14230_4Fast => "ISO 14230-4 (KWP FAST)",
            BusProtocol::Iso15765_4Can11_500 => "ISO 15765-4 (CAN 11/500)",
            BusProtocol::Iso15765_4Can29_500 => "ISO 15765-4 (CAN 29/500)",
            BusProtocol::Iso15765_4Can11_250 => "ISO 15765-4 (CAN 11/250)",
            BusProtocol::Iso15765_4Can29_250 => "ISO 15765-4 (CAN 29/250)",
            BusProtocol::SaeJ1939 => "SAE J1939 (CAN 29/250)",
        }
    }

    /// Whether the protocol is in the ISO 15765-4 CAN family.
    pub fn is_can(&self) -> bool {
        is_can_protocol(self.id())
    }
}

/// One raw unit of reply data from the adapter: a single reply line and the
/// payload bytes decoded from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The reply line as received, without the trailing CR.
    pub raw: String,
    /// Payload bytes decoded from the line.
    pub data: Vec<u8>,
}

impl Frame {
    /// Parse one adapter reply line into a frame.
    ///
    /// Returns `None` for lines that are not a run of hex byte pairs
    /// (status words like `NO DATA`, prompts, empty lines).
    pub fn parse(line: &str) -> Option<Frame> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        match parse_reply_line(trimmed) {
            Ok((_, data)) => Some(Frame {
                raw: trimmed.to_string(),
                data,
            }),
            Err(_) => None,
        }
    }
}

/// An ordered sequence of reply frames plus the derived flat payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub frames: Vec<Frame>,
    /// Concatenation of the frame payloads.
    pub data: Vec<u8>,
}

impl Message {
    /// Build a message from frames, deriving `data` by concatenation.
    pub fn new(frames: Vec<Frame>) -> Self {
        let data = frames.iter().flat_map(|f| f.data.iter().copied()).collect();
        Message { frames, data }
    }

    /// Build a message with an explicit payload.
    ///
    /// Used by batch reassembly to produce self-contained sub-replies that
    /// keep the carrier's frames but own their sliced payload.
    pub fn with_data(frames: Vec<Frame>, data: Vec<u8>) -> Self {
        Message { frames, data }
    }
}

/// Uses the `nom` crate to parse one reply line: hex byte pairs, optionally
/// separated by spaces, and nothing else.
fn parse_reply_line(input: &str) -> IResult<&str, Vec<u8>> {
    all_consuming(terminated(many1(preceded(space0, hex_pair)), space0))(input)
}

fn hex_pair(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |s: &str| u8::from_str_radix(s, 16),
    )(input)
}
