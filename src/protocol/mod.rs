//! Wire-level protocol definitions.
//!
//! Command bytes, pin modes, the incremental [`Parser`] that reconstructs
//! frames from an unframed byte stream, and the process-wide sysex handler
//! [`registry`].

pub mod parser;
pub mod registry;

pub use parser::{Frame, Parser};

use serde::{Deserialize, Serialize};
use std::fmt;

// Base commands. Commands below 0xF0 carry a 4-bit channel in the low nibble.
pub const DIGITAL_MESSAGE: u8 = 0x90;
pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const REPORT_ANALOG: u8 = 0xC0;
pub const REPORT_DIGITAL: u8 = 0xD0;
pub const START_SYSEX: u8 = 0xF0;
pub const PIN_MODE: u8 = 0xF4;
pub const END_SYSEX: u8 = 0xF7;
pub const REPORT_VERSION: u8 = 0xF9;
pub const SYSTEM_RESET: u8 = 0xFF;

// Sysex command ids.
pub const SERIAL_MESSAGE: u8 = 0x60;
pub const ANALOG_MAPPING_QUERY: u8 = 0x69;
pub const ANALOG_MAPPING_RESPONSE: u8 = 0x6A;
pub const CAPABILITY_QUERY: u8 = 0x6B;
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
pub const PIN_STATE_QUERY: u8 = 0x6D;
pub const PIN_STATE_RESPONSE: u8 = 0x6E;
pub const EXTENDED_ANALOG: u8 = 0x6F;
pub const SERVO_CONFIG: u8 = 0x70;
pub const STRING_DATA: u8 = 0x71;
pub const STEPPER: u8 = 0x72;
pub const ONEWIRE_DATA: u8 = 0x73;
pub const PING_READ: u8 = 0x75;
pub const I2C_REQUEST: u8 = 0x76;
pub const I2C_REPLY: u8 = 0x77;
pub const I2C_CONFIG: u8 = 0x78;
pub const QUERY_FIRMWARE: u8 = 0x79;
pub const SAMPLING_INTERVAL: u8 = 0x7A;

/// Per-pin terminator in capability replies, "no channel" in analog mappings.
pub const PIN_TERMINATOR: u8 = 0x7F;

pub const MIN_SAMPLING_INTERVAL: u32 = 10;
pub const MAX_SAMPLING_INTERVAL: u32 = 65535;

/// Wrap a sysex body in the START/END envelope.
pub fn sysex(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(body.len() + 2);
    frame.push(START_SYSEX);
    frame.extend_from_slice(body);
    frame.push(END_SYSEX);
    frame
}

/// Operating mode of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    Input,
    Output,
    Analog,
    Pwm,
    Servo,
    Shift,
    I2c,
    OneWire,
    Stepper,
    Serial,
    Pullup,
    Ping,
    Ignore,
    Unknown(u8),
}

impl PinMode {
    /// Modes whose digital value is driven by the board rather than the host.
    pub fn is_input_like(self) -> bool {
        matches!(self, PinMode::Input | PinMode::Pullup)
    }
}

impl From<u8> for PinMode {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => PinMode::Input,
            0x01 => PinMode::Output,
            0x02 => PinMode::Analog,
            0x03 => PinMode::Pwm,
            0x04 => PinMode::Servo,
            0x05 => PinMode::Shift,
            0x06 => PinMode::I2c,
            0x07 => PinMode::OneWire,
            0x08 => PinMode::Stepper,
            0x0A => PinMode::Serial,
            0x0B => PinMode::Pullup,
            0x75 => PinMode::Ping,
            0x7F => PinMode::Ignore,
            other => PinMode::Unknown(other),
        }
    }
}

impl From<PinMode> for u8 {
    fn from(mode: PinMode) -> Self {
        match mode {
            PinMode::Input => 0x00,
            PinMode::Output => 0x01,
            PinMode::Analog => 0x02,
            PinMode::Pwm => 0x03,
            PinMode::Servo => 0x04,
            PinMode::Shift => 0x05,
            PinMode::I2c => 0x06,
            PinMode::OneWire => 0x07,
            PinMode::Stepper => 0x08,
            PinMode::Serial => 0x0A,
            PinMode::Pullup => 0x0B,
            PinMode::Ping => 0x75,
            PinMode::Ignore => 0x7F,
            PinMode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinMode::Unknown(byte) => write!(f, "unknown(0x{:02x})", byte),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_mode_round_trip_known_values() {
        for byte in [0x00u8, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0A, 0x0B, 0x75, 0x7F] {
            assert_eq!(u8::from(PinMode::from(byte)), byte);
        }
    }

    #[test]
    fn test_unknown_mode_is_preserved() {
        assert_eq!(PinMode::from(0x10), PinMode::Unknown(0x10));
        assert_eq!(PinMode::Unknown(0x10).to_string(), "unknown(0x10)");
    }

    #[test]
    fn test_input_like() {
        assert!(PinMode::Input.is_input_like());
        assert!(PinMode::Pullup.is_input_like());
        assert!(!PinMode::Output.is_input_like());
    }

    #[test]
    fn test_sysex_envelope() {
        assert_eq!(sysex(&[QUERY_FIRMWARE]), vec![0xF0, 0x79, 0xF7]);
    }
}
