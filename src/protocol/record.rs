//! Event record framing
//!
//! Header layout, little-endian on the wire:
//!
//! | byte | bits | meaning |
//! |------|------|---------|
//! | 0    | 7    | message type, 1 = event |
//! | 0    | 6..3 | technology type, 0b0100 = Bluetooth |
//! | 0    | 2..0 | payload length bits 10..8 |
//! | 1    | 7..0 | payload length bits 7..0 |
//! | 2    |      | class |
//! | 3    |      | method |
//!
//! The event identifier is the header word with the length bits masked
//! out, so it depends only on message type, technology, class and method.

use heapless::Vec;

use super::DecodeError;
use crate::config::{MAX_RECORD_PAYLOAD, RECORD_HEADER_LEN};

/// First header byte of every event record, length bits cleared
pub const EVENT_HEADER_BYTE: u8 = 0xA0;

const TYPE_MASK: u8 = 0xF8;
const LENGTH_HIGH_MASK: u8 = 0x07;

/// Header word bits that make up the event identifier
pub const ID_MASK: u32 = 0xFFFF_00F8;

/// Event identifier for a class/method pair
pub const fn event_id(class: u8, method: u8) -> u32 {
    EVENT_HEADER_BYTE as u32 | (class as u32) << 16 | (method as u32) << 24
}

/// Record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header([u8; RECORD_HEADER_LEN]);

impl Header {
    /// Build an event header
    ///
    /// Lengths beyond the 11-bit field are rejected.
    pub fn new(class: u8, method: u8, payload_len: usize) -> Result<Self, DecodeError> {
        if payload_len > 0x7FF {
            return Err(DecodeError::Oversize { len: payload_len });
        }
        Ok(Self([
            EVENT_HEADER_BYTE | (payload_len >> 8) as u8,
            payload_len as u8,
            class,
            method,
        ]))
    }

    /// Parse raw header bytes, rejecting anything but an event header
    pub fn parse(bytes: [u8; RECORD_HEADER_LEN]) -> Result<Self, DecodeError> {
        if !is_event_start(bytes[0]) {
            return Err(DecodeError::BadHeader);
        }
        Ok(Self(bytes))
    }

    pub fn id(&self) -> u32 {
        u32::from_le_bytes(self.0) & ID_MASK
    }

    pub fn payload_len(&self) -> usize {
        ((self.0[0] & LENGTH_HIGH_MASK) as usize) << 8 | self.0[1] as usize
    }

    pub fn class(&self) -> u8 {
        self.0[2]
    }

    pub fn method(&self) -> u8 {
        self.0[3]
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_HEADER_LEN] {
        &self.0
    }
}

fn is_event_start(byte: u8) -> bool {
    byte & TYPE_MASK == EVENT_HEADER_BYTE
}

/// One complete event record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    header: Header,
    payload: Vec<u8, MAX_RECORD_PAYLOAD>,
}

impl Record {
    /// Assemble a record from class, method and payload bytes
    pub fn from_parts(class: u8, method: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        let header = Header::new(class, method, payload.len())?;
        let payload = Vec::from_slice(payload).map_err(|_| DecodeError::Oversize {
            len: payload.len(),
        })?;
        Ok(Self { header, payload })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Event identifier
    pub fn id(&self) -> u32 {
        self.header.id()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

enum State {
    /// Waiting for a valid first header byte
    Sync,
    /// Collecting the rest of the header
    Header { buf: [u8; RECORD_HEADER_LEN], filled: usize },
    /// Collecting payload bytes of an accepted header
    Payload { header: Header },
    /// Skipping the payload of an oversize record
    Skip { remaining: usize },
}

/// Reassembles records from a byte stream
///
/// Bytes that cannot start a header are discarded until one can, which
/// resynchronises the stream after line noise or a lost byte.
pub struct RecordAssembler {
    state: State,
    payload: Vec<u8, MAX_RECORD_PAYLOAD>,
    discarded: u32,
}

impl RecordAssembler {
    pub const fn new() -> Self {
        Self {
            state: State::Sync,
            payload: Vec::new(),
            discarded: 0,
        }
    }

    /// Feed one byte
    ///
    /// Returns a record when this byte completed one, or an error when a
    /// header declared a payload that cannot be buffered. The payload of
    /// such a record is skipped.
    pub fn push(&mut self, byte: u8) -> Option<Result<Record, DecodeError>> {
        match &mut self.state {
            State::Sync => {
                if is_event_start(byte) {
                    let mut buf = [0; RECORD_HEADER_LEN];
                    buf[0] = byte;
                    self.state = State::Header { buf, filled: 1 };
                } else {
                    self.discarded = self.discarded.wrapping_add(1);
                }
                None
            }
            State::Header { buf, filled } => {
                buf[*filled] = byte;
                *filled += 1;
                if *filled < RECORD_HEADER_LEN {
                    return None;
                }
                let header = Header(*buf);
                self.start_payload(header)
            }
            State::Payload { header } => {
                let header = *header;
                // Capacity was checked against the header length
                let _ = self.payload.push(byte);
                if self.payload.len() < header.payload_len() {
                    return None;
                }
                Some(Ok(self.finish(header)))
            }
            State::Skip { remaining } => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.state = State::Sync;
                }
                None
            }
        }
    }

    fn start_payload(&mut self, header: Header) -> Option<Result<Record, DecodeError>> {
        let len = header.payload_len();
        if len > MAX_RECORD_PAYLOAD {
            self.state = State::Skip { remaining: len };
            return Some(Err(DecodeError::Oversize { len }));
        }
        if len == 0 {
            return Some(Ok(self.finish(header)));
        }
        self.payload.clear();
        self.state = State::Payload { header };
        None
    }

    fn finish(&mut self, header: Header) -> Record {
        self.state = State::Sync;
        let payload = core::mem::take(&mut self.payload);
        Record { header, payload }
    }

    /// Bytes thrown away while hunting for a header
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Drop any partially assembled record
    pub fn reset(&mut self) {
        self.state = State::Sync;
        self.payload.clear();
    }
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new()
    }
}
