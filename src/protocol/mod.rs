//! Protocol stack event demultiplexer
//!
//! The radio stack reports everything it does as binary event records:
//! a 4-byte header carrying the event identifier and payload length,
//! followed by the payload fields of that event in a fixed order.
//!
//! - [`record`]: header layout, record buffer and byte-stream framing
//! - [`events`]: the typed [`Event`] union and positional field decoding
//! - [`handlers`]: a table of independently optional event handlers
//! - [`dispatch`]: the perpetual receive/dispatch loop
//!
//! Records with an identifier this firmware does not know are ignored, so
//! a newer stack can add events without breaking older firmware.

pub mod record;
#[macro_use]
pub mod events;
pub mod dispatch;
pub mod handlers;

pub use dispatch::{EventLoop, EventSource, Outcome};
pub use events::{BdAddr, Event, EventKind, LongArray};
pub use handlers::EventHandlers;
pub use record::{Header, Record, RecordAssembler};

use core::fmt;

/// Malformed event record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload ended before all fields of the event were read
    Truncated { needed: usize, available: usize },
    /// Declared payload length exceeds the record buffer
    Oversize { len: usize },
    /// First header byte does not mark an event record
    BadHeader,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "record truncated: {} payload bytes needed, {} available",
                needed, available
            ),
            DecodeError::Oversize { len } => {
                write!(f, "record payload of {} bytes does not fit the buffer", len)
            }
            DecodeError::BadHeader => write!(f, "not an event record header"),
        }
    }
}
