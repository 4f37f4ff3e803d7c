//! Session state records: pins, versions and resolutions.

use crate::protocol::PinMode;
use serde::Serialize;
use std::collections::BTreeMap;

/// One physical pin, indexed by its pin number in [`Board::pins`](super::Board::pins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pin {
    pub supported_modes: Vec<PinMode>,
    /// Resolution in bits for each supported mode, as reported by capability discovery.
    pub resolutions: BTreeMap<u8, u8>,
    pub mode: Option<PinMode>,
    pub value: u32,
    pub report: bool,
    /// Present only on pins whose supported modes include [`PinMode::Analog`].
    pub analog_channel: Option<u8>,
    /// Last state returned by a pin-state query.
    pub state: u32,
}

impl Pin {
    pub fn supports(&self, mode: PinMode) -> bool {
        self.supported_modes.contains(&mode)
    }

    pub fn is_analog(&self) -> bool {
        self.supports(PinMode::Analog)
    }
}

/// Protocol version reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

/// Firmware identity returned by the firmware query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Firmware {
    pub name: String,
    pub version: Version,
}

/// Largest raw value for analog inputs and PWM outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub adc: u32,
    pub pwm: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self { adc: 1023, pwm: 255 }
    }
}

impl Resolution {
    /// Maximum value representable with `bits` bits.
    pub fn max_for_bits(bits: u8) -> u32 {
        if bits >= 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        }
    }
}

/// Build a pin table without capability discovery.
///
/// Every pin supports digital input/output, PWM and servo; pins listed in
/// `analog_pins` additionally support analog input and are given channels in
/// list order.
pub fn default_pins(count: usize, analog_pins: &[u8]) -> Vec<Pin> {
    let mut pins: Vec<Pin> = (0..count)
        .map(|_| Pin {
            supported_modes: vec![PinMode::Input, PinMode::Output, PinMode::Pwm, PinMode::Servo],
            ..Pin::default()
        })
        .collect();

    for (channel, &index) in analog_pins.iter().enumerate() {
        if let Some(pin) = pins.get_mut(usize::from(index)) {
            pin.supported_modes.push(PinMode::Analog);
            pin.mode = Some(PinMode::Analog);
            pin.analog_channel = u8::try_from(channel).ok();
        }
    }
    pins
}
