//! Servo pulse-range configuration.
//!
//! The range is sent as two 14-bit microsecond values and the pin is
//! switched to servo mode locally; positions are then written with
//! [`Board::servo_write`].
//!
//! ```
//! use firmata_host::board::ServoConfig;
//! use firmata_host::{Board, BoardOptions, MockSerialPort};
//!
//! let port = MockSerialPort::new("MOCK0");
//! let (mut board, _events) = Board::new(port.clone(), BoardOptions::default());
//! board.servo_config(&ServoConfig { pin: Some(9), min: Some(544), max: Some(2400) })?;
//! assert_eq!(port.last_write(), Some(vec![0xF0, 0x70, 9, 32, 4, 96, 18, 0xF7]));
//! # Ok::<(), firmata_host::FirmataError>(())
//! ```

use super::Board;
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::{PinMode, SERVO_CONFIG};

/// Pulse range for a servo pin. Every field is required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServoConfig {
    pub pin: Option<u8>,
    /// Minimum pulse width in microseconds.
    pub min: Option<u16>,
    /// Maximum pulse width in microseconds.
    pub max: Option<u16>,
}

impl Board {
    /// Set a servo's pulse range and put its pin in servo mode.
    pub fn servo_config(&mut self, config: &ServoConfig) -> FirmataResult<()> {
        let pin = config.pin.ok_or(ProtocolError::ServoConfigIncomplete("pin"))?;
        let min = config.min.ok_or(ProtocolError::ServoConfigIncomplete("min"))?;
        let max = config.max.ok_or(ProtocolError::ServoConfigIncomplete("max"))?;

        self.write_sysex(&[
            SERVO_CONFIG,
            pin,
            (min & 0x7F) as u8,
            ((min >> 7) & 0x7F) as u8,
            (max & 0x7F) as u8,
            ((max >> 7) & 0x7F) as u8,
        ])?;
        if let Some(record) = self.pins.get_mut(usize::from(pin)) {
            record.mode = Some(PinMode::Servo);
        }
        Ok(())
    }

    pub fn servo_config_positional(&mut self, pin: u8, min: u16, max: u16) -> FirmataResult<()> {
        self.servo_config(&ServoConfig {
            pin: Some(pin),
            min: Some(min),
            max: Some(max),
        })
    }
}
