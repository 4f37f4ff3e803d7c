//! The protocol session.
//!
//! A [`Board`] owns the transport write half, the parse buffer and all
//! session state for one connection. The transport read half is pumped into
//! it through [`Board::on_data`]; decoded results come back out as
//! [`BoardEvent`]s on the channel returned by [`Board::new`] and through the
//! per-request callbacks the sub-protocol operations accept.
//!
//! Everything runs on the caller's thread: one session is mutated by one
//! caller at a time, in byte arrival order.

pub mod events;
pub mod handshake;
pub mod i2c;
pub mod onewire;
pub mod ping;
pub mod serial;
pub mod servo;
pub mod state;
pub mod stepper;

pub use events::{BoardEvent, EventReceiver, EventSender};
pub use handshake::HandshakeState;
pub use i2c::{I2cConfig, I2cPeripheral};
pub use onewire::DeviceAddress;
pub use ping::PingRequest;
pub use serial::{SerialConfig, SerialPortId};
pub use servo::ServoConfig;
pub use state::{Firmware, Pin, Resolution, Version};
pub use stepper::{StepDirection, StepperMove, StepperType};

use crate::codec;
use crate::error::{FirmataResult, ProtocolError};
use crate::port::SerialPortAdapter;
use crate::protocol::{
    self, registry, Frame, Parser, PinMode, ANALOG_MAPPING_QUERY, ANALOG_MESSAGE,
    CAPABILITY_QUERY, DIGITAL_MESSAGE, EXTENDED_ANALOG, MAX_SAMPLING_INTERVAL,
    MIN_SAMPLING_INTERVAL, PIN_MODE, PIN_STATE_QUERY, PIN_TERMINATOR, QUERY_FIRMWARE,
    REPORT_ANALOG, REPORT_DIGITAL, REPORT_VERSION, SAMPLING_INTERVAL, STRING_DATA, SYSTEM_RESET,
};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub const LOW: u8 = 0;
pub const HIGH: u8 = 1;

/// Pin numbers are 7-bit on the wire, so no table grows past this.
pub const MAX_PINS: usize = 128;

/// Pin table size used when capability discovery is skipped and no count is given.
pub const DEFAULT_PIN_COUNT: usize = MAX_PINS;

const PORT_COUNT: usize = 16;

type DigitalHandler = Box<dyn FnMut(u8) + Send>;
type AnalogHandler = Box<dyn FnMut(u16) + Send>;
type PinStateHandler = Box<dyn FnOnce(&Pin) + Send>;

/// Session start-up options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardOptions {
    /// How long to wait for a volunteered version report before asking for one.
    pub report_version_timeout: Duration,
    /// Timeouts tolerated before giving up. `None` retries indefinitely.
    pub max_retries: Option<u32>,
    /// Go straight to ready after the firmware reply.
    pub skip_capabilities: bool,
    /// Sampling interval to send once the firmware has identified itself.
    pub sampling_interval: Option<u32>,
    /// Analog-capable pins, in channel order, when capabilities are skipped.
    pub analog_pins: Option<Vec<u8>>,
    /// Pin table size when capabilities are skipped.
    pub pin_count: Option<usize>,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            report_version_timeout: Duration::from_millis(5000),
            max_retries: None,
            skip_capabilities: false,
            sampling_interval: None,
            analog_pins: None,
            pin_count: None,
        }
    }
}

/// One protocol session over one transport.
pub struct Board {
    transport: Box<dyn SerialPortAdapter>,
    events: EventSender,
    options: BoardOptions,
    parser: Parser,
    handshake: handshake::Handshake,
    pins: Vec<Pin>,
    analog_pins: Vec<u8>,
    version: Option<Version>,
    firmware: Option<Firmware>,
    resolution: Resolution,
    ports: [u16; PORT_COUNT],
    digital_handlers: HashMap<u8, Vec<DigitalHandler>>,
    analog_handlers: HashMap<u8, Vec<AnalogHandler>>,
    pin_state_handlers: HashMap<u8, Vec<PinStateHandler>>,
    i2c: i2c::I2cState,
    onewire: onewire::OneWireState,
    serial: serial::SerialState,
    stepper: stepper::StepperState,
    ping: ping::PingState,
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("transport", &self.transport.name())
            .field("handshake", &self.handshake.state())
            .field("pins", &self.pins.len())
            .field("analog_pins", &self.analog_pins)
            .field("firmware", &self.firmware)
            .finish()
    }
}

impl Board {
    /// Create a session over `transport`. Events are delivered on the returned receiver.
    pub fn new<T>(transport: T, options: BoardOptions) -> (Self, EventReceiver)
    where
        T: SerialPortAdapter + 'static,
    {
        let (events, receiver) = mpsc::unbounded_channel();
        let board = Self {
            transport: Box::new(transport),
            events,
            options,
            parser: Parser::new(),
            handshake: handshake::Handshake::default(),
            pins: Vec::new(),
            analog_pins: Vec::new(),
            version: None,
            firmware: None,
            resolution: Resolution::default(),
            ports: [0; PORT_COUNT],
            digital_handlers: HashMap::new(),
            analog_handlers: HashMap::new(),
            pin_state_handlers: HashMap::new(),
            i2c: i2c::I2cState::default(),
            onewire: onewire::OneWireState::default(),
            serial: serial::SerialState::default(),
            stepper: stepper::StepperState::default(),
            ping: ping::PingState::default(),
        };
        (board, receiver)
    }

    pub fn options(&self) -> &BoardOptions {
        &self.options
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn pin(&self, index: u8) -> Option<&Pin> {
        self.pins.get(usize::from(index))
    }

    /// Mutable access to a pin record, for callers that learn capabilities out of band.
    pub fn pin_mut(&mut self, index: u8) -> Option<&mut Pin> {
        self.pins.get_mut(usize::from(index))
    }

    /// Analog-capable pin numbers indexed by analog channel.
    pub fn analog_pins(&self) -> &[u8] {
        &self.analog_pins
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn firmware(&self) -> Option<&Firmware> {
        self.firmware.as_ref()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Publish an event to this session's consumer.
    ///
    /// Custom sysex handlers use this to surface what they decode.
    pub fn emit(&self, event: BoardEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }

    fn write(&mut self, bytes: &[u8]) -> FirmataResult<()> {
        trace!(?bytes, "write");
        self.transport.write_bytes(bytes)?;
        Ok(())
    }

    fn write_sysex(&mut self, body: &[u8]) -> FirmataResult<()> {
        self.write(&protocol::sysex(body))
    }

    /// Surface a failure from inside reply processing, where there is no caller to return it to.
    fn report(&self, context: &str, result: FirmataResult<()>) {
        if let Err(err) = result {
            warn!(%err, context, "operation failed while processing input");
            self.emit(BoardEvent::error(format!("{context}: {err}")));
        }
    }

    fn pin_index(&self, pin: u8) -> FirmataResult<usize> {
        let index = usize::from(pin);
        if index < self.pins.len() {
            Ok(index)
        } else {
            Err(ProtocolError::UnknownPin(pin).into())
        }
    }

    // Transport notifications.

    /// The transport opened: emit `Connect` and start the handshake timer.
    pub fn on_open(&mut self) {
        info!(port = self.transport.name(), "transport open");
        self.emit(BoardEvent::Connect);
        self.begin_handshake();
    }

    /// Feed received bytes through the parser, dispatching each completed frame.
    pub fn on_data(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if let Some(frame) = self.parser.feed(byte) {
                self.dispatch(frame);
            }
        }
    }

    /// The transport reported an error. The session stays open.
    pub fn on_transport_error(&mut self, err: impl fmt::Display) {
        warn!(%err, "transport error");
        self.emit(BoardEvent::error(err.to_string()));
    }

    pub fn on_close(&mut self) {
        if self.parser.in_sysex() {
            warn!(
                pending = self.parser.pending().len(),
                "transport closed inside an unterminated sysex"
            );
            self.emit(BoardEvent::error("truncated sysex message at close"));
        }
        self.parser.reset();
        self.handshake.disarm();
        info!(port = self.transport.name(), "transport closed");
        self.emit(BoardEvent::Close);
    }

    pub fn on_disconnect(&mut self) {
        info!(port = self.transport.name(), "transport disconnected");
        self.handshake.disarm();
        self.emit(BoardEvent::Disconnect);
    }

    fn dispatch(&mut self, frame: Frame) {
        if self.version.is_none() && !matches!(frame, Frame::Version { .. }) {
            debug!(?frame, "discarding frame received before the version report");
            return;
        }

        match frame {
            Frame::Version { major, minor } => {
                debug!(major, minor, "version report");
                self.version = Some(Version { major, minor });
                self.emit(BoardEvent::VersionReport { major, minor });
                let result = self.version_received();
                self.report("firmware query", result);
            }
            Frame::Digital { port, value } => self.apply_digital_report(port, value),
            Frame::Analog { channel, value } => self.apply_analog_report(channel, value),
            Frame::Sysex { id, body } => match registry::lookup(id) {
                Some(handler) => {
                    debug!(id = format_args!("0x{:02x}", id), len = body.len(), "sysex");
                    handler(self, &body);
                }
                None => debug!(
                    id = format_args!("0x{:02x}", id),
                    "discarding sysex with no registered handler"
                ),
            },
        }
    }

    fn apply_digital_report(&mut self, port: u8, mask: u16) {
        for bit in 0..8u8 {
            let index = port * 8 + bit;
            let Some(pin) = self.pins.get_mut(usize::from(index)) else {
                continue;
            };
            if !pin.mode.is_some_and(PinMode::is_input_like) {
                continue;
            }
            let value = ((mask >> bit) & 1) as u8;
            pin.value = u32::from(value);

            if let Some(handlers) = self.digital_handlers.get_mut(&index) {
                for handler in handlers.iter_mut() {
                    handler(value);
                }
            }
            self.emit(BoardEvent::DigitalRead { pin: index, value });
        }
    }

    fn apply_analog_report(&mut self, channel: u8, value: u16) {
        if let Some(&index) = self.analog_pins.get(usize::from(channel)) {
            if let Some(pin) = self.pins.get_mut(usize::from(index)) {
                pin.value = u32::from(value);
            }
        }
        if let Some(handlers) = self.analog_handlers.get_mut(&channel) {
            for handler in handlers.iter_mut() {
                handler(value);
            }
        }
        self.emit(BoardEvent::AnalogRead { channel, value });
    }

    // Base operations.

    pub fn pin_mode(&mut self, pin: u8, mode: PinMode) -> FirmataResult<()> {
        let index = self.pin_index(pin)?;
        self.write(&[PIN_MODE, pin, u8::from(mode)])?;
        self.pins[index].mode = Some(mode);
        Ok(())
    }

    /// Set one output pin. The whole 8-pin port is written from the port cache.
    pub fn digital_write(&mut self, pin: u8, value: u8) -> FirmataResult<()> {
        let port = usize::from(pin >> 3);
        if port >= PORT_COUNT {
            return Err(ProtocolError::UnknownPin(pin).into());
        }
        let bit = 1u16 << (pin & 0x07);
        if value == LOW {
            self.ports[port] &= !bit;
        } else {
            self.ports[port] |= bit;
        }
        if let Some(record) = self.pins.get_mut(usize::from(pin)) {
            record.value = u32::from(value != LOW);
        }

        let mask = self.ports[port];
        self.write(&[
            DIGITAL_MESSAGE | port as u8,
            (mask & 0x7F) as u8,
            ((mask >> 7) & 0x7F) as u8,
        ])
    }

    /// Enable reporting for the pin's port and call `handler` with every reported value.
    pub fn digital_read<F>(&mut self, pin: u8, handler: F) -> FirmataResult<()>
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.report_digital_pin(pin, true)?;
        self.digital_handlers
            .entry(pin)
            .or_default()
            .push(Box::new(handler));
        Ok(())
    }

    pub fn report_digital_pin(&mut self, pin: u8, enable: bool) -> FirmataResult<()> {
        let port = pin >> 3;
        if usize::from(port) >= PORT_COUNT {
            return Err(ProtocolError::UnknownPin(pin).into());
        }
        self.write(&[REPORT_DIGITAL | port, u8::from(enable)])?;
        if let Some(record) = self.pins.get_mut(usize::from(pin)) {
            record.report = enable;
        }
        Ok(())
    }

    /// Enable reporting for an analog channel and call `handler` with every sample.
    pub fn analog_read<F>(&mut self, channel: u8, handler: F) -> FirmataResult<()>
    where
        F: FnMut(u16) + Send + 'static,
    {
        self.report_analog_pin(channel, true)?;
        self.analog_handlers
            .entry(channel)
            .or_default()
            .push(Box::new(handler));
        Ok(())
    }

    pub fn report_analog_pin(&mut self, channel: u8, enable: bool) -> FirmataResult<()> {
        if channel > 0x0F {
            return Err(ProtocolError::UnknownPin(channel).into());
        }
        self.write(&[REPORT_ANALOG | channel, u8::from(enable)])?;
        if let Some(&index) = self.analog_pins.get(usize::from(channel)) {
            if let Some(record) = self.pins.get_mut(usize::from(index)) {
                record.report = enable;
            }
        }
        Ok(())
    }

    /// Write an analog (PWM/servo) value. Pins above 15 and values above
    /// 14 bits use the extended analog message.
    pub fn analog_write(&mut self, pin: u8, value: u32) -> FirmataResult<()> {
        if pin > 0x0F || value > 0x3FFF {
            let mut body = vec![
                EXTENDED_ANALOG,
                pin,
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ];
            for shift in [14u32, 21, 28] {
                if value >> shift == 0 {
                    break;
                }
                body.push(((value >> shift) & 0x7F) as u8);
            }
            self.write_sysex(&body)?;
        } else {
            self.write(&[
                ANALOG_MESSAGE | pin,
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ])?;
        }
        if let Some(record) = self.pins.get_mut(usize::from(pin)) {
            record.value = value;
        }
        Ok(())
    }

    pub fn pwm_write(&mut self, pin: u8, value: u32) -> FirmataResult<()> {
        self.analog_write(pin, value)
    }

    pub fn servo_write(&mut self, pin: u8, value: u32) -> FirmataResult<()> {
        self.analog_write(pin, value)
    }

    /// Set how often the firmware samples analog inputs, clamped to the protocol range.
    pub fn set_sampling_interval(&mut self, interval_ms: u32) -> FirmataResult<()> {
        let interval = interval_ms.clamp(MIN_SAMPLING_INTERVAL, MAX_SAMPLING_INTERVAL);
        debug!(requested = interval_ms, interval, "sampling interval");
        self.write_sysex(&[
            SAMPLING_INTERVAL,
            (interval & 0x7F) as u8,
            ((interval >> 7) & 0x7F) as u8,
        ])
    }

    /// Ask for a pin's mode and state; `handler` runs once with the updated record.
    pub fn query_pin_state<F>(&mut self, pin: u8, handler: F) -> FirmataResult<()>
    where
        F: FnOnce(&Pin) + Send + 'static,
    {
        self.write_sysex(&[PIN_STATE_QUERY, pin])?;
        self.pin_state_handlers
            .entry(pin)
            .or_default()
            .push(Box::new(handler));
        Ok(())
    }

    /// Send a UTF-8 string to the firmware.
    pub fn send_string(&mut self, text: &str) -> FirmataResult<()> {
        let mut body = Vec::with_capacity(text.len() * 2 + 3);
        body.push(STRING_DATA);
        body.extend(codec::encode(text.as_bytes()));
        body.extend_from_slice(&[0, 0]);
        self.write_sysex(&body)
    }

    /// Send an arbitrary extended command. `body` starts with the command id.
    pub fn sysex_command(&mut self, body: &[u8]) -> FirmataResult<()> {
        self.write_sysex(body)
    }

    /// Route extended command `id` to [`BoardEvent::Sysex`] with its raw body.
    ///
    /// The route is installed in the process-wide registry and so applies to
    /// every session.
    pub fn sysex_response(id: u8) {
        registry::register(id, move |board, body| {
            board.emit(BoardEvent::Sysex {
                id,
                body: body.to_vec(),
            });
        });
    }

    pub fn system_reset(&mut self) -> FirmataResult<()> {
        self.write(&[SYSTEM_RESET])
    }

    pub fn report_version(&mut self) -> FirmataResult<()> {
        self.write(&[REPORT_VERSION])
    }

    pub fn query_firmware(&mut self) -> FirmataResult<()> {
        self.write_sysex(&[QUERY_FIRMWARE])
    }

    pub fn query_capabilities(&mut self) -> FirmataResult<()> {
        self.write_sysex(&[CAPABILITY_QUERY])
    }

    pub fn query_analog_mapping(&mut self) -> FirmataResult<()> {
        self.write_sysex(&[ANALOG_MAPPING_QUERY])
    }
}

// Built-in reply handlers, installed in the registry.

pub(crate) fn handle_firmware(board: &mut Board, body: &[u8]) {
    let [major, minor, name @ ..] = body else {
        warn!(len = body.len(), "firmware reply too short");
        return;
    };
    let name_pairs = &name[..name.len() & !1];
    let name = match codec::decode(name_pairs) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    };
    let (major, minor) = (*major, *minor);

    info!(%name, major, minor, "firmware");
    board.firmware = Some(Firmware {
        name: name.clone(),
        version: Version { major, minor },
    });
    board.emit(BoardEvent::FirmwareReport { name, major, minor });

    let result = board.firmware_received();
    board.report("capability query", result);
}

pub(crate) fn handle_capabilities(board: &mut Board, body: &[u8]) {
    if board.pins.is_empty() {
        let mut pins = Vec::new();
        let mut current = Pin::default();
        let mut i = 0;
        while i < body.len() {
            let byte = body[i];
            if byte == PIN_TERMINATOR {
                pins.push(std::mem::take(&mut current));
                i += 1;
                if pins.len() == MAX_PINS && i < body.len() {
                    warn!(
                        max = MAX_PINS,
                        dropped_bytes = body.len() - i,
                        "capability reply lists more pins than are addressable, truncating"
                    );
                    break;
                }
                continue;
            }
            let bits = body.get(i + 1).copied().unwrap_or(0);
            let mode = PinMode::from(byte);
            match mode {
                PinMode::Analog => board.resolution.adc = Resolution::max_for_bits(bits),
                PinMode::Pwm => board.resolution.pwm = Resolution::max_for_bits(bits),
                _ => {}
            }
            current.supported_modes.push(mode);
            current.resolutions.insert(byte, bits);
            i += 2;
        }
        debug!(pins = pins.len(), "capabilities");
        board.pins = pins;
    } else {
        debug!("pin table already populated, capability reply not applied");
    }

    board.emit(BoardEvent::CapabilitiesReceived {
        pin_count: board.pins.len(),
    });
    let result = board.capabilities_received();
    board.report("analog mapping query", result);
}

pub(crate) fn handle_analog_mapping(board: &mut Board, body: &[u8]) {
    let mut channels: Vec<(u8, u8)> = Vec::new();
    for (index, pin) in board.pins.iter_mut().enumerate() {
        pin.analog_channel = None;
        let channel = body.get(index).copied().unwrap_or(PIN_TERMINATOR);
        if channel == PIN_TERMINATOR || !pin.is_analog() {
            continue;
        }
        let Ok(number) = u8::try_from(index) else {
            warn!(index, channel, "analog mapping for a pin past the addressable range");
            continue;
        };
        pin.analog_channel = Some(channel);
        channels.push((channel, number));
    }
    channels.sort_unstable();
    board.analog_pins = channels.into_iter().map(|(_, index)| index).collect();

    debug!(analog_pins = ?board.analog_pins, "analog mapping");
    board.emit(BoardEvent::AnalogMappingReceived {
        analog_pins: board.analog_pins.clone(),
    });
    board.analog_mapping_received();
}

pub(crate) fn handle_pin_state(board: &mut Board, body: &[u8]) {
    let [pin, mode, state_bytes @ ..] = body else {
        warn!(len = body.len(), "pin state reply too short");
        return;
    };
    let (pin, mode) = (*pin, PinMode::from(*mode));
    let state = state_bytes
        .iter()
        .take(3)
        .enumerate()
        .fold(0u32, |acc, (i, &b)| acc | (u32::from(b & 0x7F) << (7 * i)));

    let Some(record) = board.pins.get_mut(usize::from(pin)) else {
        warn!(pin, "pin state reply for unknown pin");
        return;
    };
    record.mode = Some(mode);
    record.state = state;

    if let Some(handlers) = board.pin_state_handlers.remove(&pin) {
        let record = &board.pins[usize::from(pin)];
        for handler in handlers {
            handler(record);
        }
    }
    board.emit(BoardEvent::PinState { pin, mode, state });
}

pub(crate) fn handle_string(board: &mut Board, body: &[u8]) {
    let bytes: Vec<u8> = body.iter().copied().filter(|&b| b != 0).collect();
    let text = String::from_utf8_lossy(&bytes).into_owned();
    debug!(%text, "string");
    board.emit(BoardEvent::StringData { text });
}
