//! Transport trait and line settings.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Firmata's customary line speed.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Line settings for opening a serial device. Framing is always 8N1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    pub baud_rate: u32,

    /// How long a blocking read waits before giving up with a timeout.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortConfiguration {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// A duplex byte channel.
///
/// Writes carry whole frames. Reads return whatever is buffered, which may
/// split or join frames arbitrarily.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the channel, returning how many were accepted.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read available bytes into `buffer`.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Device path or other identifier, for logs.
    fn name(&self) -> &str;

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Discard anything unread or unsent.
    fn clear_buffers(&mut self) -> Result<(), PortError>;

    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 57_600);
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.with_baud_rate(115_200).baud_rate, 115_200);
    }
}
