//! Shared harness for integration tests.
//!
//! Builds sessions over a [`MockSerialPort`] and feeds them the replies an
//! Arduino Uno running StandardFirmata sends during the handshake.

#![allow(dead_code)]

use firmata_host::board::{Board, BoardEvent, BoardOptions, EventReceiver};
use firmata_host::codec::encode;
use firmata_host::port::MockSerialPort;

pub const START_SYSEX: u8 = 0xF0;
pub const END_SYSEX: u8 = 0xF7;

pub const PWM_PINS: [usize; 5] = [3, 5, 6, 10, 11];

/// Version report for protocol 2.3.
pub fn version_report() -> Vec<u8> {
    vec![0xF9, 2, 3]
}

/// Firmware reply naming "StandardFirmata" version 2.3.
pub fn firmware_reply() -> Vec<u8> {
    let mut frame = vec![START_SYSEX, 0x79, 2, 3];
    frame.extend(encode(b"StandardFirmata"));
    frame.push(END_SYSEX);
    frame
}

/// Capability reply for 20 pins: 0 and 1 have no modes, 2..=19 are digital
/// I/O and servo, 14..=19 are also analog, the usual five are PWM.
pub fn uno_capabilities() -> Vec<u8> {
    let mut frame = vec![START_SYSEX, 0x6C];
    for pin in 0..20usize {
        if (2..=19).contains(&pin) {
            frame.extend_from_slice(&[0x00, 1, 0x01, 1]);
        }
        if (14..=19).contains(&pin) {
            frame.extend_from_slice(&[0x02, 10]);
        }
        if PWM_PINS.contains(&pin) {
            frame.extend_from_slice(&[0x03, 8]);
        }
        if pin >= 2 {
            frame.extend_from_slice(&[0x04, 14]);
        }
        frame.push(0x7F);
    }
    frame.push(END_SYSEX);
    frame
}

/// Analog mapping reply: pins 14..=19 carry channels 0..=5.
pub fn uno_analog_mapping() -> Vec<u8> {
    let mut frame = vec![START_SYSEX, 0x6A];
    for pin in 0..20u8 {
        frame.push(if pin >= 14 { pin - 14 } else { 0x7F });
    }
    frame.push(END_SYSEX);
    frame
}

pub fn new_board(options: BoardOptions) -> (Board, MockSerialPort, EventReceiver) {
    let port = MockSerialPort::new("MOCK0");
    let (board, events) = Board::new(port.clone(), options);
    (board, port, events)
}

/// A session that has completed the full handshake against an Uno.
/// The write log and the event queue are empty on return.
pub fn ready_uno() -> (Board, MockSerialPort, EventReceiver) {
    let (mut board, port, mut events) = new_board(BoardOptions::default());
    board.on_open();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());
    board.on_data(&uno_capabilities());
    board.on_data(&uno_analog_mapping());
    assert!(board.is_ready(), "handshake did not complete");

    port.clear_write_log();
    drain(&mut events);
    (board, port, events)
}

/// A session that skipped capability discovery.
pub fn ready_without_capabilities(options: BoardOptions) -> (Board, MockSerialPort, EventReceiver) {
    let options = BoardOptions {
        skip_capabilities: true,
        ..options
    };
    let (mut board, port, mut events) = new_board(options);
    board.on_open();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());
    assert!(board.is_ready(), "handshake did not complete");

    port.clear_write_log();
    drain(&mut events);
    (board, port, events)
}

/// Everything emitted so far.
pub fn drain(events: &mut EventReceiver) -> Vec<BoardEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Feed a byte sequence one byte per call.
pub fn feed_bytewise(board: &mut Board, bytes: &[u8]) {
    for byte in bytes {
        board.on_data(std::slice::from_ref(byte));
    }
}
