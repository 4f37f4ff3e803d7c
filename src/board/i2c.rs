//! I2C requests and replies.
//!
//! Peripherals are tracked per session. An entry is created with
//! `stop_tx = true` the first time any operation names its address.
//! Requests fail with [`ProtocolError::I2cNotEnabled`] until
//! [`Board::i2c_config`] has run once for the session.

use super::{Board, BoardEvent};
use crate::codec::{self, word14};
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::{I2C_CONFIG, I2C_REQUEST};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const MODE_WRITE: u8 = 0;
const MODE_READ: u8 = 1;
const MODE_CONTINUOUS_READ: u8 = 2;
const MODE_STOP_READING: u8 = 3;

const RESTART_TX: u8 = 0x40;
const TEN_BIT_ADDRESS: u8 = 0x20;

type ReplyHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Stored settings for one peripheral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct I2cPeripheral {
    /// End the bus transaction after each operation.
    pub stop_tx: bool,
    /// Caller-defined extra settings.
    pub settings: Map<String, Value>,
}

impl Default for I2cPeripheral {
    fn default() -> Self {
        Self {
            stop_tx: true,
            settings: Map::new(),
        }
    }
}

/// Arguments for [`Board::i2c_config`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct I2cConfig {
    pub address: Option<u16>,
    /// Microseconds between a write and the following read. Defaults to 0.
    pub delay: u16,
    pub stop_tx: Option<bool>,
    /// Merged over the peripheral's existing extra settings.
    pub settings: Map<String, Value>,
}

impl I2cConfig {
    pub fn with_delay(delay: u16) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn for_address(address: u16) -> Self {
        Self {
            address: Some(address),
            ..Self::default()
        }
    }
}

struct Listener {
    once: bool,
    handler: ReplyHandler,
}

#[derive(Default)]
pub(crate) struct I2cState {
    enabled: bool,
    delay: u16,
    peripherals: HashMap<u16, I2cPeripheral>,
    listeners: HashMap<(u16, u16), Listener>,
}

impl I2cState {
    fn peripheral(&mut self, address: u16) -> &mut I2cPeripheral {
        self.peripherals.entry(address).or_default()
    }
}

impl Board {
    /// Enable I2C and set the session-wide delay. With an address, also
    /// creates or updates that peripheral's settings.
    pub fn i2c_config(&mut self, config: I2cConfig) -> FirmataResult<()> {
        self.i2c.enabled = true;
        self.i2c.delay = config.delay;

        if let Some(address) = config.address {
            let peripheral = self.i2c.peripheral(address);
            if let Some(stop_tx) = config.stop_tx {
                peripheral.stop_tx = stop_tx;
            }
            peripheral.settings.extend(config.settings);
        }

        self.write_sysex(&[
            I2C_CONFIG,
            (config.delay & 0xFF) as u8,
            ((config.delay >> 8) & 0xFF) as u8,
        ])
    }

    pub fn i2c_delay(&self) -> u16 {
        self.i2c.delay
    }

    pub fn i2c_peripheral(&self, address: u16) -> Option<&I2cPeripheral> {
        self.i2c.peripherals.get(&address)
    }

    pub fn i2c_peripherals(&self) -> &HashMap<u16, I2cPeripheral> {
        &self.i2c.peripherals
    }

    /// Write `data`, preceded by `register` when given.
    pub fn i2c_write(&mut self, address: u16, register: Option<u8>, data: &[u8]) -> FirmataResult<()> {
        let mut payload = Vec::with_capacity(data.len() + 1);
        payload.extend(register);
        payload.extend_from_slice(data);
        self.i2c_request(address, MODE_WRITE, &codec::encode(&payload))
    }

    /// Write one or more bytes starting at `register`.
    pub fn i2c_write_reg(&mut self, address: u16, register: u8, data: &[u8]) -> FirmataResult<()> {
        self.i2c_write(address, Some(register), data)
    }

    /// Read `length` bytes continuously; `handler` runs for every reply.
    pub fn i2c_read<F>(
        &mut self,
        address: u16,
        register: Option<u8>,
        length: u16,
        handler: F,
    ) -> FirmataResult<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.i2c_read_request(address, register, length, false, Box::new(handler))
    }

    /// Read `length` bytes once; `handler` runs for the first matching reply only.
    pub fn i2c_read_once<F>(
        &mut self,
        address: u16,
        register: Option<u8>,
        length: u16,
        handler: F,
    ) -> FirmataResult<()>
    where
        F: FnOnce(&[u8]) + Send + 'static,
    {
        let mut handler = Some(handler);
        let wrapped = move |data: &[u8]| {
            if let Some(handler) = handler.take() {
                handler(data);
            }
        };
        self.i2c_read_request(address, register, length, true, Box::new(wrapped))
    }

    /// Stop continuous reads from `address` and drop their handlers.
    pub fn i2c_stop(&mut self, address: u16) -> FirmataResult<()> {
        self.i2c_request(address, MODE_STOP_READING, &[])?;
        self.i2c.listeners.retain(|(addr, _), _| *addr != address);
        Ok(())
    }

    fn i2c_read_request(
        &mut self,
        address: u16,
        register: Option<u8>,
        length: u16,
        once: bool,
        handler: ReplyHandler,
    ) -> FirmataResult<()> {
        let mode = if once { MODE_READ } else { MODE_CONTINUOUS_READ };
        let mut payload = Vec::with_capacity(4);
        if let Some(register) = register {
            payload.extend_from_slice(&[register & 0x7F, (register >> 7) & 0x7F]);
        }
        payload.extend_from_slice(&[(length & 0x7F) as u8, ((length >> 7) & 0x7F) as u8]);

        self.i2c_request(address, mode, &payload)?;
        let key = (address, u16::from(register.unwrap_or(0)));
        self.i2c.listeners.insert(key, Listener { once, handler });
        Ok(())
    }

    fn i2c_request(&mut self, address: u16, mode: u8, payload: &[u8]) -> FirmataResult<()> {
        if !self.i2c.enabled {
            return Err(ProtocolError::I2cNotEnabled.into());
        }
        let stop_tx = self.i2c.peripheral(address).stop_tx;

        let mut control = mode << 3;
        if !stop_tx {
            control |= RESTART_TX;
        }
        if address > 0x7F {
            control |= TEN_BIT_ADDRESS | ((address >> 7) & 0x07) as u8;
        }

        let mut body = Vec::with_capacity(payload.len() + 3);
        body.extend_from_slice(&[I2C_REQUEST, (address & 0x7F) as u8, control]);
        body.extend_from_slice(payload);
        self.write_sysex(&body)
    }
}

/// Reply body: address pair, register pair, then one pair per data byte.
pub(crate) fn handle_reply(board: &mut Board, body: &[u8]) {
    if body.len() < 4 {
        warn!(len = body.len(), "i2c reply too short");
        return;
    }
    let address = word14(body[0], body[1]);
    let register = word14(body[2], body[3]);
    let data = match codec::decode(&body[4..]) {
        Ok(data) => data,
        Err(err) => {
            warn!(%err, address, "malformed i2c reply");
            return;
        }
    };

    let key = (address, register);
    let remove = match board.i2c.listeners.get_mut(&key) {
        Some(listener) => {
            (listener.handler)(&data);
            listener.once
        }
        None => {
            debug!(address, register, "i2c reply with no listener");
            false
        }
    };
    if remove {
        board.i2c.listeners.remove(&key);
    }

    board.emit(BoardEvent::I2cReply {
        address,
        register,
        data,
    });
}
