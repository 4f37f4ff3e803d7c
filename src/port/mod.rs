//! Byte transport for a Firmata session.
//!
//! The protocol engine only needs to write frames and have incoming bytes
//! delivered to it. [`SerialPortAdapter`] covers both a real serial device
//! and [`MockSerialPort`] for tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::SyncSerialPort;
pub use traits::{PortConfiguration, SerialPortAdapter};
