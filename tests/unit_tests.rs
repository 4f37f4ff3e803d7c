//! Unit tests for firmata-host core types
//!
//! Covers:
//! - `codec`: the pair codec against known vectors
//! - `error`: display strings and usage-error classification
//! - `board::events`: JSON shape of emitted events
//! - `protocol`: pin mode mapping and sysex framing

use firmata_host::board::{BoardEvent, Pin};
use firmata_host::codec::{decode, encode, word14, CodecError};
use firmata_host::config::ConfigError;
use firmata_host::protocol::{sysex, PinMode};
use firmata_host::{FirmataError, PortError, ProtocolError};
use serde_json::json;

// ============================================================================
// Codec Tests
// ============================================================================

#[cfg(test)]
mod codec_tests {
    use super::*;

    #[test]
    fn test_encode_known_vector() {
        assert_eq!(encode(&[0, 1, 2, 3, 4]), vec![0, 0, 1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn test_encode_high_bytes() {
        assert_eq!(encode(&[252, 253, 254]), vec![124, 1, 125, 1, 126, 1]);
    }

    #[test]
    fn test_decode_known_vector() {
        let decoded = decode(&[0, 0, 1, 0, 2, 0, 3, 0, 4, 0]).expect("even length decodes");
        assert_eq!(decoded, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_odd_length_fails() {
        assert_eq!(decode(&[0, 0, 1]), Err(CodecError::MalformedLength(3)));
    }

    #[test]
    fn test_word14() {
        assert_eq!(word14(127, 7), 1023);
        assert_eq!(word14(50, 1), 0xB2);
    }
}

// ============================================================================
// Error Tests
// ============================================================================

#[cfg(test)]
mod error_display_tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err: FirmataError = ProtocolError::I2cNotEnabled.into();
        assert_eq!(err.to_string(), "ProtocolError: i2c not enabled");

        let err: FirmataError = ProtocolError::MissingSerialPins.into();
        assert_eq!(err.to_string(), "ProtocolError: missing serial pins");
    }

    #[test]
    fn test_codec_error_display() {
        let err: FirmataError = CodecError::MalformedLength(3).into();
        assert!(err.to_string().starts_with("CodecError: malformed length"));
    }

    #[test]
    fn test_transport_error_display() {
        let err: FirmataError = PortError::NotOpen.into();
        assert_eq!(err.to_string(), "transport error: Port is not open");
    }

    #[test]
    fn test_config_error_display() {
        let err: FirmataError = ConfigError::NoSerialPort.into();
        assert!(err.to_string().contains("Missing required configuration: serial port"));
    }
}

#[cfg(test)]
mod error_classification_tests {
    use super::*;

    #[test]
    fn test_usage_errors() {
        let usage: [FirmataError; 3] = [
            ProtocolError::UnknownPin(40).into(),
            ProtocolError::ServoConfigIncomplete("min").into(),
            CodecError::MalformedLength(1).into(),
        ];
        for err in usage {
            assert!(err.is_usage_error(), "{err} should be a usage error");
        }
    }

    #[test]
    fn test_transport_errors_are_not_usage_errors() {
        let err: FirmataError = PortError::not_found("/dev/ttyACM9").into();
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_question_mark_operator_pattern() {
        fn decode_name(pairs: &[u8]) -> Result<String, FirmataError> {
            let bytes = decode(pairs)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }

        assert_eq!(decode_name(&[b'o', 0, b'k', 0]).unwrap(), "ok");
        assert!(matches!(
            decode_name(&[b'o']),
            Err(FirmataError::Codec(CodecError::MalformedLength(1)))
        ));
    }
}

// ============================================================================
// Event Serialization Tests
// ============================================================================

#[cfg(test)]
mod event_json_tests {
    use super::*;

    #[test]
    fn test_unit_variants() {
        assert_eq!(serde_json::to_value(BoardEvent::Connect).unwrap(), json!({ "event": "connect" }));
        assert_eq!(serde_json::to_value(BoardEvent::Close).unwrap(), json!({ "event": "close" }));
    }

    #[test]
    fn test_i2c_reply() {
        let event = BoardEvent::I2cReply {
            address: 0x68,
            register: 0,
            data: vec![1, 2],
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({ "event": "i2c_reply", "address": 104, "register": 0, "data": [1, 2] })
        );
    }

    #[test]
    fn test_pin_state_uses_mode_names() {
        let event = BoardEvent::PinState {
            pin: 2,
            mode: PinMode::Input,
            state: 1024,
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["event"], "pin_state");
        assert_eq!(value["mode"], "input");
        assert_eq!(value["state"], 1024);
    }

    #[test]
    fn test_pin_record_serializes() {
        let pin = Pin {
            supported_modes: vec![PinMode::Input, PinMode::Analog],
            analog_channel: Some(0),
            ..Pin::default()
        };
        let value = serde_json::to_value(pin).unwrap();
        assert_eq!(value["supported_modes"], json!(["input", "analog"]));
        assert_eq!(value["analog_channel"], 0);
        assert_eq!(value["mode"], serde_json::Value::Null);
    }
}

// ============================================================================
// Protocol Tests
// ============================================================================

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_sysex_envelope() {
        assert_eq!(sysex(&[0x79]), vec![0xF0, 0x79, 0xF7]);
    }

    #[test]
    fn test_pin_mode_bytes() {
        assert_eq!(u8::from(PinMode::Ping), 0x75);
        assert_eq!(PinMode::from(0x0B), PinMode::Pullup);
        assert!(PinMode::Pullup.is_input_like());
        assert!(!PinMode::Output.is_input_like());
    }
}
