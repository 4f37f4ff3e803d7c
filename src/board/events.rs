//! Notifications delivered to the consumer of a [`Board`](super::Board).

use crate::protocol::PinMode;
use serde::Serialize;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<BoardEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<BoardEvent>;

/// Everything a session reports, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BoardEvent {
    /// The transport opened. Independent of handshake progress.
    Connect,
    /// The handshake completed. Fires once per session.
    Ready,
    Close,
    Disconnect,
    Error { message: String },
    VersionReport { major: u8, minor: u8 },
    FirmwareReport { name: String, major: u8, minor: u8 },
    CapabilitiesReceived { pin_count: usize },
    AnalogMappingReceived { analog_pins: Vec<u8> },
    DigitalRead { pin: u8, value: u8 },
    AnalogRead { channel: u8, value: u16 },
    PinState { pin: u8, mode: PinMode, state: u32 },
    StringData { text: String },
    I2cReply { address: u16, register: u16, data: Vec<u8> },
    SerialData { port: u8, data: Vec<u8> },
    /// Raw body of an extended command routed by [`Board::sysex_response`](super::Board::sysex_response).
    Sysex { id: u8, body: Vec<u8> },
}

impl BoardEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
