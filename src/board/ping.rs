//! Ultrasonic ping reads.
//!
//! The request and reply carry 32-bit quantities most significant byte
//! first, each byte as a 7-bit pair.

use super::Board;
use crate::codec::{self, word14};
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::{PinMode, PING_READ};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT_MICROS: u32 = 1_000_000;

type DurationHandler = Box<dyn FnOnce(u32) + Send>;

/// Arguments for [`Board::ping_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRequest {
    pub pin: u8,
    /// Level of the trigger pulse.
    pub value: u8,
    /// Trigger pulse width in microseconds.
    pub pulse_out: u32,
    /// Give up after this many microseconds.
    pub timeout: u32,
}

impl PingRequest {
    pub fn new(pin: u8, value: u8) -> Self {
        Self {
            pin,
            value,
            pulse_out: 0,
            timeout: DEFAULT_TIMEOUT_MICROS,
        }
    }
}

#[derive(Default)]
pub(crate) struct PingState {
    pending: HashMap<u8, DurationHandler>,
}

impl Board {
    /// Trigger a ping on a pin that supports it. `handler` runs once with the
    /// echo duration in microseconds.
    pub fn ping_read<F>(&mut self, request: PingRequest, handler: F) -> FirmataResult<()>
    where
        F: FnOnce(u32) + Send + 'static,
    {
        let supported = self
            .pin(request.pin)
            .is_some_and(|pin| pin.supports(PinMode::Ping));
        if !supported {
            return Err(ProtocolError::PingNotSupported(request.pin).into());
        }

        let mut body = vec![PING_READ, request.pin, request.value];
        body.extend(codec::encode(&request.pulse_out.to_be_bytes()));
        body.extend(codec::encode(&request.timeout.to_be_bytes()));
        self.write_sysex(&body)?;

        self.ping.pending.insert(request.pin, Box::new(handler));
        Ok(())
    }
}

/// Reply body: pin pair, then the duration as four pairs.
pub(crate) fn handle_reply(board: &mut Board, body: &[u8]) {
    if body.len() < 10 {
        warn!(len = body.len(), "ping reply too short");
        return;
    }
    let Ok(pin) = u8::try_from(word14(body[0], body[1])) else {
        warn!(
            pin = word14(body[0], body[1]),
            "ping reply for a pin past the addressable range"
        );
        return;
    };
    let duration = match codec::decode(&body[2..10]) {
        Ok(bytes) => bytes
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
        Err(err) => {
            warn!(%err, pin, "malformed ping reply");
            return;
        }
    };

    match board.ping.pending.remove(&pin) {
        Some(handler) => handler(duration),
        None => debug!(pin, duration, "ping reply with no pending read"),
    }
}
