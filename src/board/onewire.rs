//! 1-Wire bus operations.
//!
//! Every request is `[0xF0, 0x73, subcommand, pin, body..., 0xF7]`. Requests
//! that carry a device, a read, a delay or write data use a 16-byte header
//! followed by the write bytes, bit-packed into 7-bit groups:
//!
//! ```text
//! 0..8    device address
//! 8..10   bytes to read (LE)
//! 10..12  correlation id (LE)
//! 12..16  delay in microseconds (LE)
//! 16..    bytes to write
//! ```
//!
//! Read replies echo the correlation id in their first two bytes. Search
//! replies are matched by pin.

use super::Board;
use crate::codec::{pack_7bit, unpack_7bit};
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::ONEWIRE_DATA;
use std::collections::HashMap;
use tracing::{debug, warn};

pub type DeviceAddress = [u8; 8];

const SEARCH_REQUEST: u8 = 0x40;
const CONFIG_REQUEST: u8 = 0x41;
const SEARCH_REPLY: u8 = 0x42;
const READ_REPLY: u8 = 0x43;
const SEARCH_ALARMS_REQUEST: u8 = 0x44;
const SEARCH_ALARMS_REPLY: u8 = 0x45;

const RESET_BIT: u8 = 0x01;
const READ_BIT: u8 = 0x08;
const DELAY_BIT: u8 = 0x10;
const WRITE_BIT: u8 = 0x20;
const WITH_DATA_BITS: u8 = 0x3C;

const HEADER_LEN: usize = 16;

type SearchHandler = Box<dyn FnOnce(Vec<DeviceAddress>) + Send>;
type ReadHandler = Box<dyn FnOnce(Vec<u8>) + Send>;

#[derive(Default)]
pub(crate) struct OneWireState {
    next_id: u16,
    searches: HashMap<(u8, u8), SearchHandler>,
    reads: HashMap<u16, ReadHandler>,
}

impl OneWireState {
    fn allocate_id(&mut self) -> FirmataResult<u16> {
        for _ in 0..=u16::MAX {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.reads.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(ProtocolError::DuplicateCorrelation.into())
    }
}

#[derive(Default)]
struct Request<'a> {
    reset: bool,
    device: Option<&'a DeviceAddress>,
    read: Option<(u16, u16)>,
    delay: Option<u32>,
    data: &'a [u8],
}

impl Request<'_> {
    fn subcommand(&self) -> u8 {
        let mut sub = 0;
        if self.reset {
            sub |= RESET_BIT;
        }
        if self.read.is_some() {
            sub |= READ_BIT;
        }
        if self.delay.is_some() {
            sub |= DELAY_BIT;
        }
        if !self.data.is_empty() {
            sub |= WRITE_BIT;
        }
        if self.has_body() {
            sub |= WITH_DATA_BITS;
        }
        sub
    }

    fn has_body(&self) -> bool {
        self.device.is_some() || self.read.is_some() || self.delay.is_some() || !self.data.is_empty()
    }

    fn body(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        if let Some(device) = self.device {
            bytes[..8].copy_from_slice(device);
        }
        if let Some((len, id)) = self.read {
            bytes[8..10].copy_from_slice(&len.to_le_bytes());
            bytes[10..12].copy_from_slice(&id.to_le_bytes());
        }
        if let Some(delay) = self.delay {
            bytes[12..16].copy_from_slice(&delay.to_le_bytes());
        }
        bytes.extend_from_slice(self.data);
        pack_7bit(&bytes)
    }
}

impl Board {
    /// Configure `pin` as a 1-Wire bus.
    pub fn onewire_config(&mut self, pin: u8, parasitic_power: bool) -> FirmataResult<()> {
        self.write_sysex(&[ONEWIRE_DATA, CONFIG_REQUEST, pin, u8::from(parasitic_power)])
    }

    /// Enumerate devices on the bus. `handler` runs once with their addresses.
    pub fn onewire_search<F>(&mut self, pin: u8, handler: F) -> FirmataResult<()>
    where
        F: FnOnce(Vec<DeviceAddress>) + Send + 'static,
    {
        self.onewire_search_with(SEARCH_REQUEST, SEARCH_REPLY, pin, Box::new(handler))
    }

    /// Enumerate devices currently signalling an alarm.
    pub fn onewire_search_alarms<F>(&mut self, pin: u8, handler: F) -> FirmataResult<()>
    where
        F: FnOnce(Vec<DeviceAddress>) + Send + 'static,
    {
        self.onewire_search_with(SEARCH_ALARMS_REQUEST, SEARCH_ALARMS_REPLY, pin, Box::new(handler))
    }

    fn onewire_search_with(
        &mut self,
        request: u8,
        reply: u8,
        pin: u8,
        handler: SearchHandler,
    ) -> FirmataResult<()> {
        self.write_sysex(&[ONEWIRE_DATA, request, pin])?;
        self.onewire.searches.insert((reply, pin), handler);
        Ok(())
    }

    pub fn onewire_reset(&mut self, pin: u8) -> FirmataResult<()> {
        self.onewire_request(
            pin,
            &Request {
                reset: true,
                ..Request::default()
            },
        )
    }

    pub fn onewire_delay(&mut self, pin: u8, micros: u32) -> FirmataResult<()> {
        self.onewire_request(
            pin,
            &Request {
                delay: Some(micros),
                ..Request::default()
            },
        )
    }

    pub fn onewire_write(&mut self, pin: u8, device: &DeviceAddress, data: &[u8]) -> FirmataResult<()> {
        self.onewire_request(
            pin,
            &Request {
                device: Some(device),
                data,
                ..Request::default()
            },
        )
    }

    /// Read `length` bytes from `device`. `handler` runs once with the bytes read.
    pub fn onewire_read<F>(
        &mut self,
        pin: u8,
        device: &DeviceAddress,
        length: u16,
        handler: F,
    ) -> FirmataResult<()>
    where
        F: FnOnce(Vec<u8>) + Send + 'static,
    {
        self.onewire_write_and_read(pin, device, &[], length, handler)
    }

    /// Write `data` to `device`, then read `length` bytes back.
    pub fn onewire_write_and_read<F>(
        &mut self,
        pin: u8,
        device: &DeviceAddress,
        data: &[u8],
        length: u16,
        handler: F,
    ) -> FirmataResult<()>
    where
        F: FnOnce(Vec<u8>) + Send + 'static,
    {
        let id = self.onewire.allocate_id()?;
        self.onewire_request(
            pin,
            &Request {
                device: Some(device),
                read: Some((length, id)),
                data,
                ..Request::default()
            },
        )?;
        self.onewire.reads.insert(id, Box::new(handler));
        Ok(())
    }

    /// Reads still waiting for a reply.
    pub fn onewire_pending_reads(&self) -> usize {
        self.onewire.reads.len()
    }

    fn onewire_request(&mut self, pin: u8, request: &Request<'_>) -> FirmataResult<()> {
        let mut frame = vec![ONEWIRE_DATA, request.subcommand(), pin];
        if request.has_body() {
            frame.extend(request.body());
        }
        self.write_sysex(&frame)
    }
}

/// Reply body: subcommand, pin, bit-packed payload.
pub(crate) fn handle_reply(board: &mut Board, body: &[u8]) {
    let [sub, pin, packed @ ..] = body else {
        warn!(len = body.len(), "1-wire reply too short");
        return;
    };
    let (sub, pin) = (*sub, *pin);
    let data = unpack_7bit(packed);

    match sub {
        SEARCH_REPLY | SEARCH_ALARMS_REPLY => {
            let devices: Vec<DeviceAddress> = data
                .chunks_exact(8)
                .filter_map(|chunk| chunk.try_into().ok())
                .collect();
            match board.onewire.searches.remove(&(sub, pin)) {
                Some(handler) => handler(devices),
                None => debug!(pin, "1-wire search reply with no pending search"),
            }
        }
        READ_REPLY => {
            let [lo, hi, payload @ ..] = data.as_slice() else {
                warn!(pin, "1-wire read reply without correlation id");
                return;
            };
            let id = u16::from_le_bytes([*lo, *hi]);
            match board.onewire.reads.remove(&id) {
                Some(handler) => handler(payload.to_vec()),
                None => warn!(pin, id, "1-wire read reply matches no pending request"),
            }
        }
        other => debug!(pin, sub = other, "unhandled 1-wire reply"),
    }
}
