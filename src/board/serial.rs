//! Serial port bridging.
//!
//! Frames are `[0xF0, 0x60, subcommand | port, ..., 0xF7]`. Ports 0..=7 are
//! hardware UARTs on the board; 8 and up are software serial and need both
//! rx and tx pins when configured.

use super::{Board, BoardEvent};
use crate::codec;
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::SERIAL_MESSAGE;
use std::collections::HashMap;
use tracing::{debug, warn};

const CONFIG: u8 = 0x10;
const WRITE: u8 = 0x20;
const READ: u8 = 0x30;
const REPLY: u8 = 0x40;
const CLOSE: u8 = 0x50;
const FLUSH: u8 = 0x60;
const LISTEN: u8 = 0x70;

const READ_CONTINUOUS: u8 = 0;
const STOP_READING: u8 = 1;

pub const DEFAULT_BAUD: u32 = 57600;

type ReplyHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Well-known port ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SerialPortId {
    Hw0 = 0x00,
    Hw1 = 0x01,
    Hw2 = 0x02,
    Hw3 = 0x03,
    Sw0 = 0x08,
    Sw1 = 0x09,
    Sw2 = 0x0A,
    Sw3 = 0x0B,
}

impl From<SerialPortId> for u8 {
    fn from(id: SerialPortId) -> Self {
        id as u8
    }
}

/// Arguments for [`Board::serial_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialConfig {
    pub port_id: Option<u8>,
    /// Defaults to 57600.
    pub baud: Option<u32>,
    pub rx_pin: Option<u8>,
    pub tx_pin: Option<u8>,
}

#[derive(Default)]
pub(crate) struct SerialState {
    handlers: HashMap<u8, ReplyHandler>,
}

fn is_software(port: u8) -> bool {
    port > 7
}

impl Board {
    pub fn serial_config(&mut self, config: &SerialConfig) -> FirmataResult<()> {
        let port = config.port_id.ok_or(ProtocolError::MissingSerialPort)?;
        let baud = config.baud.unwrap_or(DEFAULT_BAUD);

        let mut body = vec![
            SERIAL_MESSAGE,
            CONFIG | (port & 0x0F),
            (baud & 0x7F) as u8,
            ((baud >> 7) & 0x7F) as u8,
            ((baud >> 14) & 0x7F) as u8,
        ];
        match (config.rx_pin, config.tx_pin) {
            (Some(rx), Some(tx)) => body.extend_from_slice(&[rx, tx]),
            _ if is_software(port) => return Err(ProtocolError::MissingSerialPins.into()),
            _ => {}
        }
        self.write_sysex(&body)
    }

    pub fn serial_write(&mut self, port: u8, data: &[u8]) -> FirmataResult<()> {
        let mut body = vec![SERIAL_MESSAGE, WRITE | (port & 0x0F)];
        body.extend(codec::encode(data));
        self.write_sysex(&body)
    }

    /// Start continuous reads from `port`; `handler` runs with each reply's bytes.
    pub fn serial_read<F>(&mut self, port: u8, max_bytes: Option<u16>, handler: F) -> FirmataResult<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let mut body = vec![SERIAL_MESSAGE, READ | (port & 0x0F), READ_CONTINUOUS];
        if let Some(max) = max_bytes {
            body.extend_from_slice(&[(max & 0x7F) as u8, ((max >> 7) & 0x7F) as u8]);
        }
        self.write_sysex(&body)?;
        self.serial.handlers.insert(port, Box::new(handler));
        Ok(())
    }

    /// Stop reading from `port` and drop its handler.
    pub fn serial_stop(&mut self, port: u8) -> FirmataResult<()> {
        self.write_sysex(&[SERIAL_MESSAGE, READ | (port & 0x0F), STOP_READING])?;
        self.serial.handlers.remove(&port);
        Ok(())
    }

    pub fn serial_close(&mut self, port: u8) -> FirmataResult<()> {
        self.write_sysex(&[SERIAL_MESSAGE, CLOSE | (port & 0x0F)])
    }

    pub fn serial_flush(&mut self, port: u8) -> FirmataResult<()> {
        self.write_sysex(&[SERIAL_MESSAGE, FLUSH | (port & 0x0F)])
    }

    /// Make a software port the one that listens. Hardware ports always listen.
    pub fn serial_listen(&mut self, port: u8) -> FirmataResult<()> {
        if !is_software(port) {
            return Ok(());
        }
        self.write_sysex(&[SERIAL_MESSAGE, LISTEN | (port & 0x0F)])
    }
}

/// Reply body: `REPLY | port`, then one pair per received byte.
pub(crate) fn handle_reply(board: &mut Board, body: &[u8]) {
    let [command, pairs @ ..] = body else {
        return;
    };
    if command & 0xF0 != REPLY {
        debug!(command, "ignoring serial message that is not a reply");
        return;
    }
    let port = command & 0x0F;
    let data = match codec::decode(pairs) {
        Ok(data) => data,
        Err(err) => {
            warn!(%err, port, "malformed serial reply");
            return;
        }
    };

    if let Some(handler) = board.serial.handlers.get_mut(&port) {
        handler(&data);
    }
    board.emit(BoardEvent::SerialData { port, data });
}
