//! # Per-Parameter Decoders
//!
//! Each diagnostic command carries a decoder that turns its reply payload
//! (the bytes after the mode and PID echo) into a typed [`Value`]. Decoders
//! are grouped by parameter family and shared across commands through
//! `&'static dyn Decoder` handles; formulas follow SAE J1979.

use crate::constants::PID_BITMAP_WIDTH;
use crate::obd2::response::{BitArray, Value};

/// Decodes the payload bytes of one reply into a typed value.
///
/// Implementations are stateless; `None` means the payload was too short or
/// otherwise undecodable, which the caller reports as a null response.
pub trait Decoder: Sync {
    fn decode(&self, payload: &[u8]) -> Option<Value>;

    /// Unit attached to numeric values.
    fn unit(&self) -> &'static str {
        ""
    }
}

/// Support bitmap of a PID-listing command: four payload bytes, one bit per
/// subsequent parameter.
pub struct PidBits;

impl Decoder for PidBits {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        let width = PID_BITMAP_WIDTH / 8;
        if payload.len() < width {
            return None;
        }
        Some(Value::Bits(BitArray::from_bytes(&payload[..width])))
    }
}

/// Engine speed: ((A * 256) + B) / 4 rpm.
pub struct Rpm;

impl Decoder for Rpm {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        match payload {
            [a, b, ..] => Some(Value::Numeric(
                (f64::from(*a) * 256.0 + f64::from(*b)) / 4.0,
            )),
            _ => None,
        }
    }

    fn unit(&self) -> &'static str {
        "rpm"
    }
}

/// Single unsigned byte read as-is (speed in km/h, pressures in kPa, ...).
pub struct UByte {
    pub unit: &'static str,
}

impl Decoder for UByte {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload.first().map(|a| Value::Numeric(f64::from(*a)))
    }

    fn unit(&self) -> &'static str {
        self.unit
    }
}

/// Big-endian unsigned word: (A * 256) + B (run time, distance counters).
pub struct UWord {
    pub unit: &'static str,
}

impl Decoder for UWord {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        match payload {
            [a, b, ..] => Some(Value::Numeric(f64::from(*a) * 256.0 + f64::from(*b))),
            _ => None,
        }
    }

    fn unit(&self) -> &'static str {
        self.unit
    }
}

/// Ratio scaled over the full byte range: A * 100 / 255 percent.
pub struct Percent;

impl Decoder for Percent {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric(f64::from(*a) * 100.0 / 255.0))
    }

    fn unit(&self) -> &'static str {
        "%"
    }
}

/// Centered ratio (fuel trims): (A - 128) * 100 / 128 percent.
pub struct SignedPercent;

impl Decoder for SignedPercent {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric((f64::from(*a) - 128.0) * 100.0 / 128.0))
    }

    fn unit(&self) -> &'static str {
        "%"
    }
}

/// Offset temperature: A - 40 degrees Celsius.
pub struct Temperature;

impl Decoder for Temperature {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric(f64::from(*a) - 40.0))
    }

    fn unit(&self) -> &'static str {
        "degC"
    }
}

/// Gauge fuel pressure: A * 3 kPa.
pub struct FuelPressure;

impl Decoder for FuelPressure {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric(f64::from(*a) * 3.0))
    }

    fn unit(&self) -> &'static str {
        "kPa"
    }
}

/// Mass air flow: ((A * 256) + B) / 100 grams per second.
pub struct Maf;

impl Decoder for Maf {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        match payload {
            [a, b, ..] => Some(Value::Numeric(
                (f64::from(*a) * 256.0 + f64::from(*b)) / 100.0,
            )),
            _ => None,
        }
    }

    fn unit(&self) -> &'static str {
        "g/s"
    }
}

/// Ignition timing advance: A / 2 - 64 degrees before TDC.
pub struct TimingAdvance;

impl Decoder for TimingAdvance {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric(f64::from(*a) / 2.0 - 64.0))
    }

    fn unit(&self) -> &'static str {
        "deg"
    }
}

/// Narrow-band oxygen sensor voltage: A / 200 volts.
///
/// The second payload byte (short-term fuel trim at that sensor) is left to
/// the raw bytes; callers wanting it query the trim PIDs directly.
pub struct O2Voltage;

impl Decoder for O2Voltage {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        payload
            .first()
            .map(|a| Value::Numeric(f64::from(*a) / 200.0))
    }

    fn unit(&self) -> &'static str {
        "V"
    }
}

/// Diagnostic trouble codes: two bytes per code, `(0, 0)` padding skipped.
///
/// CAN replies prefix the list with a code-count byte, which shows up as an
/// odd payload length and is dropped before pairing.
pub struct TroubleCodes;

impl Decoder for TroubleCodes {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        let pairs = if payload.len() % 2 == 1 {
            &payload[1..]
        } else {
            payload
        };

        let mut codes = Vec::new();
        for pair in pairs.chunks_exact(2) {
            if pair[0] == 0x00 && pair[1] == 0x00 {
                continue;
            }
            codes.push(format_dtc(pair[0], pair[1]));
        }
        Some(Value::Codes(codes))
    }
}

/// Passthrough for parameters without a scalar interpretation (status
/// words, sensor-presence masks) and for commands whose positive reply
/// carries no payload at all.
pub struct RawBytes;

impl Decoder for RawBytes {
    fn decode(&self, payload: &[u8]) -> Option<Value> {
        Some(Value::Raw(payload.to_vec()))
    }
}

/// Render one DTC byte pair as the conventional five-character code.
fn format_dtc(a: u8, b: u8) -> String {
    let letter = ['P', 'C', 'B', 'U'][(a >> 6) as usize];
    format!(
        "{letter}{}{:X}{:X}{:X}",
        (a >> 4) & 0b0011,
        a & 0x0F,
        b >> 4,
        b & 0x0F
    )
}

// Shared decoder instances referenced by the command registry.
pub static PID_BITS: PidBits = PidBits;
pub static RPM: Rpm = Rpm;
pub static SPEED: UByte = UByte { unit: "kph" };
pub static PRESSURE: UByte = UByte { unit: "kPa" };
pub static COUNT: UByte = UByte { unit: "" };
pub static SECONDS: UWord = UWord { unit: "s" };
pub static KILOMETERS: UWord = UWord { unit: "km" };
pub static PERCENT: Percent = Percent;
pub static SIGNED_PERCENT: SignedPercent = SignedPercent;
pub static TEMPERATURE: Temperature = Temperature;
pub static FUEL_PRESSURE: FuelPressure = FuelPressure;
pub static MAF: Maf = Maf;
pub static TIMING_ADVANCE: TimingAdvance = TimingAdvance;
pub static O2_VOLTAGE: O2Voltage = O2Voltage;
pub static TROUBLE_CODES: TroubleCodes = TroubleCodes;
pub static RAW_BYTES: RawBytes = RawBytes;
