use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for board operations.
pub type FirmataResult<T> = Result<T, FirmataError>;

/// Unified error type for the library.
#[derive(Debug, Error)]
pub enum FirmataError {
    #[error("CodecError: {0}")]
    Codec(#[from] CodecError),

    #[error("ProtocolError: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] PortError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Malformed calls and calls made before their prerequisite configuration.
///
/// These are raised synchronously and nothing is written to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("i2c not enabled")]
    I2cNotEnabled,

    #[error("missing serial pins")]
    MissingSerialPins,

    #[error("missing serial port id")]
    MissingSerialPort,

    #[error("ping not supported on pin {0}")]
    PingNotSupported(u8),

    #[error("servo config requires {0}")]
    ServoConfigIncomplete(&'static str),

    #[error("unknown pin {0}")]
    UnknownPin(u8),

    #[error("stepper {0} already has a move in progress")]
    StepperBusy(u8),

    #[error("stepper move of {0} steps exceeds the 21-bit limit")]
    StepperStepsOutOfRange(u32),

    #[error("no free correlation id")]
    DuplicateCorrelation,
}

impl FirmataError {
    /// True for errors caused by how the caller invoked an operation.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Codec(_) | Self::Protocol(_))
    }
}
