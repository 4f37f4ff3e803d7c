//! Incremental byte-stream parser.
//!
//! The transport delivers an unframed byte stream. [`Parser::feed`] consumes
//! one byte at a time and yields a [`Frame`] whenever a complete message has
//! been assembled:
//!
//! ```text
//! 0xF9 major minor                      -> Frame::Version
//! 0x9p lsb msb                          -> Frame::Digital  (p = port)
//! 0xEc lsb msb                          -> Frame::Analog   (c = channel)
//! 0xF0 id body... 0xF7                  -> Frame::Sysex
//! ```
//!
//! Any byte with the top bit set starts a new message, so a command byte
//! arriving in the middle of another message resynchronises the parser
//! instead of corrupting the frame in flight.

use super::{ANALOG_MESSAGE, DIGITAL_MESSAGE, END_SYSEX, REPORT_VERSION, START_SYSEX};
use crate::codec::word14;
use tracing::{debug, trace, warn};

/// A complete message reconstructed from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Protocol version report.
    Version { major: u8, minor: u8 },
    /// 8-pin bitmask for one digital port.
    Digital { port: u8, value: u16 },
    /// 14-bit sample for one analog channel.
    Analog { channel: u8, value: u16 },
    /// Extended command. `body` excludes the envelope and the id byte.
    Sysex { id: u8, body: Vec<u8> },
}

/// Parse buffer for one session.
#[derive(Debug, Default)]
pub struct Parser {
    buffer: Vec<u8>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one byte, returning a frame if it completes one.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        let Some(&first) = self.buffer.first() else {
            if byte & 0x80 == 0 || byte == END_SYSEX {
                trace!(byte, "dropping byte outside of any message");
            } else {
                self.buffer.push(byte);
            }
            return None;
        };

        if first == START_SYSEX {
            return self.feed_sysex(byte);
        }

        if byte & 0x80 != 0 {
            warn!(
                discarded = ?self.buffer,
                next = byte,
                "command byte interrupted an incomplete message"
            );
            self.restart(byte);
            return None;
        }

        self.buffer.push(byte);
        if self.buffer.len() < 3 {
            return None;
        }

        let frame = classify(&self.buffer);
        if frame.is_none() {
            debug!(discarded = ?self.buffer, "discarding unrecognised message");
        }
        self.buffer.clear();
        frame
    }

    fn feed_sysex(&mut self, byte: u8) -> Option<Frame> {
        if byte == END_SYSEX {
            let frame = match self.buffer.get(1) {
                Some(&id) => Some(Frame::Sysex {
                    id,
                    body: self.buffer[2..].to_vec(),
                }),
                None => {
                    debug!("discarding empty sysex envelope");
                    None
                }
            };
            self.buffer.clear();
            return frame;
        }

        if byte & 0x80 != 0 {
            warn!(
                len = self.buffer.len(),
                next = byte,
                "command byte interrupted an unterminated sysex"
            );
            self.restart(byte);
            return None;
        }

        self.buffer.push(byte);
        None
    }

    fn restart(&mut self, byte: u8) {
        self.buffer.clear();
        if byte != END_SYSEX {
            self.buffer.push(byte);
        }
    }

    /// True while a sysex has been opened but not yet terminated.
    pub fn in_sysex(&self) -> bool {
        self.buffer.first() == Some(&START_SYSEX)
    }

    /// Bytes of the message currently being assembled.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard whatever is buffered.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

fn classify(buffer: &[u8]) -> Option<Frame> {
    let first = buffer[0];
    let command = if first < START_SYSEX { first & 0xF0 } else { first };
    let (b1, b2) = (buffer[1], buffer[2]);

    match command {
        REPORT_VERSION => Some(Frame::Version {
            major: b1,
            minor: b2,
        }),
        DIGITAL_MESSAGE => Some(Frame::Digital {
            port: first & 0x0F,
            value: word14(b1, b2),
        }),
        ANALOG_MESSAGE => Some(Frame::Analog {
            channel: first & 0x0F,
            value: word14(b1, b2),
        }),
        _ => None,
    }
}
