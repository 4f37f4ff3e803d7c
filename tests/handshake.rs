mod common;

use common::*;
use firmata_host::board::{BoardEvent, BoardOptions, HandshakeState, DEFAULT_PIN_COUNT};
use firmata_host::PinMode;
use pretty_assertions::assert_eq;

#[test]
fn test_full_handshake_event_order() {
    let (mut board, port, mut events) = new_board(BoardOptions::default());
    board.on_open();
    board.on_data(&version_report());
    assert_eq!(port.last_write(), Some(vec![0xF0, 0x79, 0xF7]));

    board.on_data(&firmware_reply());
    assert_eq!(port.last_write(), Some(vec![0xF0, 0x6B, 0xF7]));
    assert_eq!(board.handshake_state(), HandshakeState::AwaitingCapabilities);

    board.on_data(&uno_capabilities());
    assert_eq!(port.last_write(), Some(vec![0xF0, 0x69, 0xF7]));

    board.on_data(&uno_analog_mapping());
    assert!(board.is_ready());

    assert_eq!(
        drain(&mut events),
        vec![
            BoardEvent::Connect,
            BoardEvent::VersionReport { major: 2, minor: 3 },
            BoardEvent::FirmwareReport {
                name: "StandardFirmata".to_string(),
                major: 2,
                minor: 3,
            },
            BoardEvent::CapabilitiesReceived { pin_count: 20 },
            BoardEvent::AnalogMappingReceived {
                analog_pins: vec![14, 15, 16, 17, 18, 19],
            },
            BoardEvent::Ready,
        ]
    );
}

#[test]
fn test_handshake_delivered_one_byte_at_a_time() {
    let (mut board, _port, mut events) = new_board(BoardOptions::default());
    board.on_open();
    for reply in [
        version_report(),
        firmware_reply(),
        uno_capabilities(),
        uno_analog_mapping(),
    ] {
        feed_bytewise(&mut board, &reply);
    }
    assert!(board.is_ready());
    assert_eq!(board.firmware().map(|f| f.name.as_str()), Some("StandardFirmata"));
    assert_eq!(drain(&mut events).last(), Some(&BoardEvent::Ready));
}

#[test]
fn test_ready_fires_once() {
    let (mut board, _port, mut events) = ready_uno();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());
    board.on_data(&uno_analog_mapping());

    let ready = drain(&mut events)
        .into_iter()
        .filter(|e| *e == BoardEvent::Ready)
        .count();
    assert_eq!(ready, 0);
    assert!(board.is_ready());
}

#[test]
fn test_reopen_after_ready_keeps_session() {
    let (mut board, port, mut events) = ready_uno();
    board.on_open();
    assert_eq!(board.handshake_state(), HandshakeState::Ready);
    assert!(board.handshake_deadline().is_none());

    board.on_data(&version_report());
    board.on_data(&firmware_reply());
    board.on_data(&uno_capabilities());
    board.on_data(&uno_analog_mapping());

    let events = drain(&mut events);
    assert_eq!(events.first(), Some(&BoardEvent::Connect));
    assert!(!events.contains(&BoardEvent::Ready));
    assert!(board.is_ready());
    assert!(port.get_write_log().is_empty());
}

#[test]
fn test_oversized_capability_reply_is_truncated() {
    let (mut board, _port, _events) = new_board(BoardOptions::default());
    board.on_open();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());

    let mut capabilities = vec![START_SYSEX, 0x6C];
    for pin in 0..300usize {
        if pin == 4 || pin == 260 {
            capabilities.extend_from_slice(&[0x02, 10]);
        } else {
            capabilities.extend_from_slice(&[0x00, 1]);
        }
        capabilities.push(0x7F);
    }
    capabilities.push(END_SYSEX);
    board.on_data(&capabilities);
    assert_eq!(board.pins().len(), 128);

    let mut mapping = vec![START_SYSEX, 0x6A];
    mapping.extend((0..300usize).map(|pin| if pin == 260 { 0 } else { 0x7F }));
    mapping.push(END_SYSEX);
    board.on_data(&mapping);
    assert!(board.is_ready());
    assert!(board.analog_pins().is_empty());

    board.on_data(&[0xE0, 0x7F, 0x07]);
    assert_eq!(board.pins()[4].value, 0);
    assert_eq!(board.pins()[4].analog_channel, None);
}

#[test]
fn test_capabilities_populate_pin_table() {
    let (board, _port, _events) = ready_uno();
    let pins = board.pins();
    assert_eq!(pins.len(), 20);

    assert!(pins[0].supported_modes.is_empty());
    assert!(pins[1].supported_modes.is_empty());
    assert_eq!(
        pins[2].supported_modes,
        vec![PinMode::Input, PinMode::Output, PinMode::Servo]
    );
    assert_eq!(
        pins[3].supported_modes,
        vec![PinMode::Input, PinMode::Output, PinMode::Pwm, PinMode::Servo]
    );
    assert_eq!(
        pins[14].supported_modes,
        vec![PinMode::Input, PinMode::Output, PinMode::Analog, PinMode::Servo]
    );
    assert_eq!(pins[3].resolutions.get(&0x03), Some(&8));
    assert_eq!(pins[14].resolutions.get(&0x02), Some(&10));

    for pin in PWM_PINS {
        assert!(pins[pin].supports(PinMode::Pwm), "pin {pin} should be PWM");
    }
    assert_eq!(board.resolution().adc, 1023);
    assert_eq!(board.resolution().pwm, 255);
}

#[test]
fn test_second_capability_reply_is_ignored() {
    let (mut board, _port, _events) = ready_uno();
    let mut reply = vec![0xF0, 0x6C];
    for _ in 0..20 {
        reply.extend_from_slice(&[0, 1, 1, 1, 0x7F]);
    }
    reply.push(0xF7);
    board.on_data(&reply);

    assert_eq!(board.pins().len(), 20);
    assert!(board.pins()[14].supports(PinMode::Analog));
}

#[test]
fn test_analog_mapping_assigns_channels() {
    let (board, _port, _events) = ready_uno();
    assert_eq!(board.analog_pins(), &[14, 15, 16, 17, 18, 19]);
    for (channel, &pin) in board.analog_pins().iter().enumerate() {
        assert_eq!(board.pin(pin).unwrap().analog_channel, Some(channel as u8));
    }
    assert!(board.pins()[..14].iter().all(|p| p.analog_channel.is_none()));
}

#[test]
fn test_skip_capabilities_uses_default_table() {
    let options = BoardOptions {
        skip_capabilities: true,
        ..BoardOptions::default()
    };
    let (mut board, port, _events) = new_board(options);
    board.on_open();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());

    assert!(board.is_ready());
    assert_eq!(board.pins().len(), DEFAULT_PIN_COUNT);
    assert!(board.analog_pins().is_empty());
    assert_eq!(port.get_write_log(), vec![vec![0xF0, 0x79, 0xF7]]);
}

#[test]
fn test_skip_capabilities_with_analog_pins() {
    let options = BoardOptions {
        analog_pins: Some(vec![14, 15, 16, 17, 18, 19]),
        pin_count: Some(20),
        ..BoardOptions::default()
    };
    let (board, _port, _events) = ready_without_capabilities(options);
    assert_eq!(board.pins().len(), 20);
    assert_eq!(board.analog_pins(), &[14, 15, 16, 17, 18, 19]);
    assert_eq!(board.pin(16).unwrap().analog_channel, Some(2));
    assert!(board.pin(16).unwrap().supports(PinMode::Analog));
    assert!(!board.pin(2).unwrap().supports(PinMode::Analog));
}

#[test]
fn test_sampling_interval_sent_after_firmware() {
    let options = BoardOptions {
        skip_capabilities: true,
        sampling_interval: Some(100),
        ..BoardOptions::default()
    };
    let (mut board, port, _events) = new_board(options);
    board.on_open();
    board.on_data(&version_report());
    board.on_data(&firmware_reply());
    assert_eq!(port.last_write(), Some(vec![240, 122, 100, 0, 247]));
}

#[test]
fn test_frames_before_version_are_discarded() {
    let (mut board, port, mut events) = new_board(BoardOptions::default());
    board.on_open();
    drain(&mut events);

    board.on_data(&firmware_reply());
    board.on_data(&[0xE0, 0x10, 0x01]);
    board.on_data(&[0x90, 0x04, 0x00]);
    assert!(drain(&mut events).is_empty());
    assert!(port.get_write_log().is_empty());
    assert_eq!(board.handshake_state(), HandshakeState::AwaitingVersion);

    board.on_data(&version_report());
    assert_eq!(
        drain(&mut events),
        vec![BoardEvent::VersionReport { major: 2, minor: 3 }]
    );
}

#[test]
fn test_version_timeout_retries() {
    let (mut board, port, _events) = new_board(BoardOptions::default());
    board.on_open();
    board.on_handshake_timeout().unwrap();
    board.on_handshake_timeout().unwrap();
    assert_eq!(board.handshake_retries(), 2);
    assert_eq!(
        port.get_write_log(),
        vec![
            vec![0xF9],
            vec![0xF0, 0x79, 0xF7],
            vec![0xF9],
            vec![0xF0, 0x79, 0xF7],
        ]
    );

    board.on_data(&version_report());
    assert!(board.handshake_deadline().is_none());
    assert_eq!(board.handshake_state(), HandshakeState::AwaitingFirmware);
}

#[test]
fn test_truncated_sysex_at_close() {
    let (mut board, _port, mut events) = ready_uno();
    board.on_data(&[0xF0, 0x71, b'h', 0]);
    board.on_close();

    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], BoardEvent::Error { message } if message.contains("truncated sysex")));
    assert_eq!(events[1], BoardEvent::Close);
}

#[test]
fn test_clean_close_and_disconnect() {
    let (mut board, _port, mut events) = ready_uno();
    board.on_disconnect();
    board.on_close();
    assert_eq!(
        drain(&mut events),
        vec![BoardEvent::Disconnect, BoardEvent::Close]
    );
}

#[test]
fn test_transport_error_keeps_session_open() {
    let (mut board, _port, mut events) = ready_uno();
    board.on_transport_error("framing error");
    assert_eq!(drain(&mut events), vec![BoardEvent::error("framing error")]);
    assert!(board.is_ready());
}
