//! In-memory transport for tests.
//!
//! Clones share state, so a test can hand one clone to a
//! [`Board`](crate::board::Board) and inspect the frames it wrote through
//! another.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes returned by subsequent reads.
    read_queue: VecDeque<u8>,
    /// One entry per `write_bytes` call.
    write_log: Vec<Vec<u8>>,
    should_timeout: bool,
    disconnected: bool,
    timeout: Duration,
    buffers_cleared: bool,
}

/// Mock serial port.
///
/// # Example
/// ```
/// use firmata_host::port::{MockSerialPort, SerialPortAdapter};
///
/// let port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(&[0xF9, 2, 5]);
///
/// let mut reader = port.clone();
/// let mut buffer = [0u8; 8];
/// let n = reader.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], &[0xF9, 2, 5]);
///
/// reader.write_bytes(&[0xF9]).unwrap();
/// assert_eq!(port.last_write(), Some(vec![0xF9]));
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_millis(100),
                ..Default::default()
            })),
        }
    }

    /// Queue bytes for subsequent reads.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Every write so far, one entry per call.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.state.lock().write_log.last().cloned()
    }

    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Make the next read or write fail with a timeout.
    pub fn set_should_timeout(&self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Simulate the device going away. Every later operation fails.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(PortError::NotOpen);
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(PortError::NotOpen);
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::timeout(state.timeout));
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        if n == 0 {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "no data available",
            )));
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        Some(self.available_bytes())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
