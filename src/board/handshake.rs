//! Connection handshake.
//!
//! ```text
//! Disconnected -> AwaitingVersion -> AwaitingFirmware
//!     -> [AwaitingCapabilities -> AwaitingAnalogMapping] -> Ready
//! ```
//!
//! The version report is normally volunteered by the firmware on reset. If
//! none arrives before the deadline, [`Board::on_handshake_timeout`] asks for
//! it explicitly and re-arms. The session does not own a timer; whoever
//! drives it polls [`Board::handshake_deadline`].

use super::state::default_pins;
use super::{Board, BoardEvent, DEFAULT_PIN_COUNT, MAX_PINS};
use crate::error::FirmataResult;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Disconnected,
    AwaitingVersion,
    AwaitingFirmware,
    AwaitingCapabilities,
    AwaitingAnalogMapping,
    Ready,
}

#[derive(Debug)]
pub(crate) struct Handshake {
    state: HandshakeState,
    deadline: Option<Instant>,
    retries: u32,
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            state: HandshakeState::Disconnected,
            deadline: None,
            retries: 0,
        }
    }
}

impl Handshake {
    pub(crate) fn state(&self) -> HandshakeState {
        self.state
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "handshake");
        self.state = next;
    }
}

impl Board {
    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state
    }

    pub fn is_ready(&self) -> bool {
        self.handshake.state == HandshakeState::Ready
    }

    /// When the pending version wait expires, if one is armed.
    pub fn handshake_deadline(&self) -> Option<Instant> {
        self.handshake.deadline
    }

    /// Number of timeouts handled so far.
    pub fn handshake_retries(&self) -> u32 {
        self.handshake.retries
    }

    pub(super) fn begin_handshake(&mut self) {
        if self.handshake.state == HandshakeState::Ready {
            debug!("already ready, handshake not restarted");
            return;
        }
        self.handshake.retries = 0;
        self.handshake.advance(HandshakeState::AwaitingVersion);
        self.arm_handshake_timer();
    }

    fn arm_handshake_timer(&mut self) {
        self.handshake.deadline = Some(Instant::now() + self.options.report_version_timeout);
    }

    /// The version wait expired: ask for the version and firmware, then re-arm.
    ///
    /// Once `max_retries` timeouts have been handled, stops retrying and
    /// emits an error instead.
    pub fn on_handshake_timeout(&mut self) -> FirmataResult<()> {
        if self.handshake.state != HandshakeState::AwaitingVersion {
            self.handshake.disarm();
            return Ok(());
        }

        if let Some(max) = self.options.max_retries {
            if self.handshake.retries >= max {
                warn!(retries = self.handshake.retries, "handshake timed out");
                self.handshake.disarm();
                self.emit(BoardEvent::error(format!(
                    "handshake timeout: no version report after {} retries",
                    self.handshake.retries
                )));
                return Ok(());
            }
        }

        self.handshake.retries += 1;
        debug!(attempt = self.handshake.retries, "no version report yet, querying");
        self.arm_handshake_timer();
        self.report_version()?;
        self.query_firmware()
    }

    pub(super) fn version_received(&mut self) -> FirmataResult<()> {
        match self.handshake.state {
            HandshakeState::Disconnected | HandshakeState::AwaitingVersion => {
                self.handshake.disarm();
                self.handshake.advance(HandshakeState::AwaitingFirmware);
                self.query_firmware()
            }
            _ => Ok(()),
        }
    }

    pub(super) fn firmware_received(&mut self) -> FirmataResult<()> {
        if self.handshake.state != HandshakeState::AwaitingFirmware {
            return Ok(());
        }

        if let Some(interval) = self.options.sampling_interval {
            self.set_sampling_interval(interval)?;
        }

        if self.options.skip_capabilities {
            if self.pins.is_empty() {
                let analog = self.options.analog_pins.clone().unwrap_or_default();
                let count = self
                    .options
                    .pin_count
                    .unwrap_or(DEFAULT_PIN_COUNT)
                    .min(MAX_PINS);
                self.pins = default_pins(count, &analog);
                self.analog_pins = analog
                    .into_iter()
                    .filter(|&pin| usize::from(pin) < count)
                    .collect();
            }
            self.enter_ready();
            Ok(())
        } else {
            self.handshake.advance(HandshakeState::AwaitingCapabilities);
            self.query_capabilities()
        }
    }

    pub(super) fn capabilities_received(&mut self) -> FirmataResult<()> {
        if self.handshake.state != HandshakeState::AwaitingCapabilities {
            return Ok(());
        }
        self.handshake.advance(HandshakeState::AwaitingAnalogMapping);
        self.query_analog_mapping()
    }

    pub(super) fn analog_mapping_received(&mut self) {
        if self.handshake.state == HandshakeState::AwaitingAnalogMapping {
            self.enter_ready();
        }
    }

    fn enter_ready(&mut self) {
        self.handshake.disarm();
        self.handshake.advance(HandshakeState::Ready);
        info!(
            pins = self.pins.len(),
            analog_pins = self.analog_pins.len(),
            "board ready"
        );
        for (index, pin) in self.pins.iter().enumerate() {
            debug!(
                pin = index,
                modes = ?pin.supported_modes,
                analog_channel = ?pin.analog_channel,
                "pin capabilities"
            );
        }
        self.emit(BoardEvent::Ready);
    }
}
