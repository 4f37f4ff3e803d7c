//! Transport errors, kept apart from protocol errors.

use thiserror::Error;

/// Failures of the byte transport beneath a [`Board`](crate::Board).
#[derive(Debug, Error)]
pub enum PortError {
    /// No serial device exists under the requested name.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// Reading or writing the device failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Baud rate or timeout settings were rejected by the device.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No bytes arrived within the read timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The device went away or was never opened.
    #[error("Port is not open")]
    NotOpen,

    /// Error reported by the `serialport` backend while opening or cloning.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// Errors a polling reader should retry after rather than treat as loss of the device.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}
