//! Host-side Firmata protocol engine.
//!
//! This library turns a serial byte stream from a board running Firmata into
//! typed events and encodes host commands back into wire frames.
//!
//! # Modules
//!
//! - `codec`: 7-bit pair codec and the bit-packed codec used by 1-Wire
//! - `protocol`: wire constants, pin modes, the incremental parser and the sysex handler registry
//! - `board`: the protocol session with its handshake and sub-protocols
//! - `port`: transport abstraction over a serial device or a mock
//! - `driver`: tokio event loop pumping a transport into a session
//! - `config`: configuration with TOML support
//! - `error`: unified error handling
//!
//! # Example
//!
//! ```
//! use firmata_host::{Board, BoardOptions, MockSerialPort};
//!
//! let port = MockSerialPort::new("MOCK0");
//! let (mut board, _events) = Board::new(port.clone(), BoardOptions::default());
//! board.on_open();
//! board.on_data(&[0xF9, 2, 5]);
//! assert_eq!(port.last_write(), Some(vec![0xF0, 0x79, 0xF7]));
//! ```

pub mod board;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod port;
pub mod protocol;

pub use board::{Board, BoardEvent, BoardOptions, EventReceiver, HandshakeState, Pin};
pub use codec::{decode, encode, CodecError};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use error::{FirmataError, FirmataResult, ProtocolError};
pub use port::{MockSerialPort, PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
pub use protocol::{Frame, Parser, PinMode};
